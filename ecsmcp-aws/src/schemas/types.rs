//! AWS-specific type definitions

use ecsmcp_core::resource::Value;
use ecsmcp_core::schema::{AttributeType, Scalar};

/// Valid AWS regions
pub const VALID_REGIONS: &[&str] = &[
    "af-south-1",
    "ap-east-1",
    "ap-northeast-1",
    "ap-northeast-2",
    "ap-northeast-3",
    "ap-south-1",
    "ap-southeast-1",
    "ap-southeast-2",
    "ca-central-1",
    "eu-central-1",
    "eu-north-1",
    "eu-south-1",
    "eu-west-1",
    "eu-west-2",
    "eu-west-3",
    "me-south-1",
    "sa-east-1",
    "us-east-1",
    "us-east-2",
    "us-west-1",
    "us-west-2",
];

/// Fargate task CPU units and the memory (MiB) each allows
const FARGATE_SIZES: &[(i64, i64, i64, i64)] = &[
    // (cpu, min memory, max memory, step)
    (256, 512, 2048, 512),
    (512, 1024, 4096, 1024),
    (1024, 2048, 8192, 1024),
    (2048, 4096, 16384, 1024),
    (4096, 8192, 30720, 1024),
    (8192, 16384, 61440, 4096),
    (16384, 32768, 122880, 8192),
];

/// CloudWatch Logs retention periods accepted by the service
const LOG_RETENTION_DAYS: &[i64] = &[
    1, 3, 5, 7, 14, 30, 60, 90, 120, 150, 180, 365, 400, 545, 731, 1096, 1827, 2192, 2557, 2922,
    3288, 3653,
];

/// AWS region type
pub fn aws_region() -> AttributeType {
    AttributeType::Custom {
        name: "Region",
        base: Scalar::String,
        check: |value| match value {
            Value::String(s) => validate_region(s),
            _ => Err("Expected string".to_string()),
        },
    }
}

pub fn validate_region(region: &str) -> Result<(), String> {
    if VALID_REGIONS.contains(&region) {
        Ok(())
    } else {
        Err(format!(
            "Invalid region '{}', expected one of: {}",
            region,
            VALID_REGIONS.join(", ")
        ))
    }
}

/// ARN string type
pub fn arn() -> AttributeType {
    AttributeType::Custom {
        name: "Arn",
        base: Scalar::String,
        check: |value| match value {
            Value::String(s) if s.starts_with("arn:") => Ok(()),
            Value::String(s) => Err(format!("'{}' is not an ARN", s)),
            _ => Err("Expected string".to_string()),
        },
    }
}

/// Fargate CPU units, as the string CloudFormation expects
pub fn fargate_cpu() -> AttributeType {
    AttributeType::Custom {
        name: "FargateCpu",
        base: Scalar::String,
        check: |value| {
            let cpu = parse_units(value)?;
            if FARGATE_SIZES.iter().any(|(c, _, _, _)| *c == cpu) {
                Ok(())
            } else {
                Err(format!("{} is not a valid Fargate CPU value", cpu))
            }
        },
    }
}

/// Fargate memory in MiB, as the string CloudFormation expects
pub fn fargate_memory() -> AttributeType {
    AttributeType::Custom {
        name: "FargateMemory",
        base: Scalar::String,
        check: |value| {
            let memory = parse_units(value)?;
            if memory >= 512 {
                Ok(())
            } else {
                Err(format!("{} MiB is below the Fargate minimum of 512", memory))
            }
        },
    }
}

fn parse_units(value: &Value) -> Result<i64, String> {
    match value {
        Value::String(s) => s
            .parse()
            .map_err(|_| format!("'{}' is not a number", s)),
        Value::Int(n) => Ok(*n),
        _ => Err("Expected numeric string".to_string()),
    }
}

/// Check that CPU and memory form a valid Fargate combination
pub fn validate_fargate_sizing(cpu: i64, memory: i64) -> Result<(), String> {
    let (_, min, max, step) = FARGATE_SIZES
        .iter()
        .find(|(c, _, _, _)| *c == cpu)
        .ok_or_else(|| format!("{} is not a valid Fargate CPU value", cpu))?;

    if memory < *min || memory > *max || (memory - min) % step != 0 {
        return Err(format!(
            "{} MiB is not valid for {} CPU units (expected {}-{} in steps of {})",
            memory, cpu, min, max, step
        ));
    }
    Ok(())
}

/// Check target group health-check timing
pub fn validate_health_check(interval: i64, timeout: i64) -> Result<(), String> {
    if !(5..=300).contains(&interval) {
        return Err(format!("Health check interval {}s must be between 5 and 300", interval));
    }
    if !(2..=120).contains(&timeout) {
        return Err(format!("Health check timeout {}s must be between 2 and 120", timeout));
    }
    if timeout >= interval {
        return Err(format!(
            "Health check timeout {}s must be smaller than the interval {}s",
            timeout, interval
        ));
    }
    Ok(())
}

/// Load balancer / target group application protocol
pub fn application_protocol() -> AttributeType {
    AttributeType::Enum(&["HTTP", "HTTPS"])
}

/// Security group rule protocol; "-1" means all
pub fn ip_protocol() -> AttributeType {
    AttributeType::Enum(&[
        "tcp",
        "udp",
        "icmp",
        "-1",
    ])
}

/// Listener rule priority
pub fn rule_priority() -> AttributeType {
    AttributeType::Custom {
        name: "RulePriority",
        base: Scalar::Int,
        check: |value| match value {
            Value::Int(n) if (1..=50000).contains(n) => Ok(()),
            _ => Err("Rule priority must be between 1 and 50000".to_string()),
        },
    }
}

/// Non-negative capacity (tasks)
pub fn capacity() -> AttributeType {
    AttributeType::Custom {
        name: "Capacity",
        base: Scalar::Int,
        check: |value| match value {
            Value::Int(n) if *n >= 0 => Ok(()),
            _ => Err("Capacity must not be negative".to_string()),
        },
    }
}

pub fn log_retention_days() -> AttributeType {
    AttributeType::Custom {
        name: "RetentionInDays",
        base: Scalar::Int,
        check: |value| match value {
            Value::Int(n) if LOG_RETENTION_DAYS.contains(n) => Ok(()),
            Value::Int(n) => Err(format!("{} is not a supported log retention period", n)),
            _ => Err("Expected integer".to_string()),
        },
    }
}

/// IAM policy document (`Version` + `Statement`)
pub fn policy_document() -> AttributeType {
    AttributeType::Custom {
        name: "PolicyDocument",
        base: Box::new(AttributeType::Object),
        validate: validate_policy_document,
    }
}

fn validate_policy_document(value: &Value) -> Result<(), String> {
    let doc = value.as_map().ok_or("Expected policy document")?;
    if doc.get("Version").and_then(Value::as_str) != Some("2012-10-17") {
        return Err("Policy document Version must be \"2012-10-17\"".to_string());
    }
    let statements = doc
        .get("Statement")
        .and_then(Value::as_list)
        .ok_or("Policy document must have a Statement list")?;
    if statements.is_empty() {
        return Err("Policy document must have at least one statement".to_string());
    }
    for (i, statement) in statements.iter().enumerate() {
        let statement = statement
            .as_map()
            .ok_or_else(|| format!("Statement {} must be an object", i))?;
        match statement.get("Effect").and_then(Value::as_str) {
            Some("Allow") | Some("Deny") => {}
            _ => return Err(format!("Statement {} must have Effect Allow or Deny", i)),
        }
        if !statement.contains_key("Action") {
            return Err(format!("Statement {} must have an Action", i));
        }
    }
    Ok(())
}

/// CloudFormation tag list
pub fn tags() -> AttributeType {
    AttributeType::list_of(AttributeType::Object)
}

/// List of nested structures
pub fn objects() -> AttributeType {
    AttributeType::list_of(AttributeType::Object)
}

pub fn strings() -> AttributeType {
    AttributeType::list_of(AttributeType::String)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_validation() {
        assert!(aws_region().validate(&Value::string("ap-northeast-1")).is_ok());
        let err = aws_region()
            .validate(&Value::string("ap-northeast-1a"))
            .unwrap_err()
            .to_string();
        assert!(err.contains("Invalid region"));
    }

    #[test]
    fn fargate_sizing_table() {
        assert!(validate_fargate_sizing(512, 1024).is_ok());
        assert!(validate_fargate_sizing(256, 512).is_ok());
        assert!(validate_fargate_sizing(4096, 30720).is_ok());
        assert!(validate_fargate_sizing(512, 512).is_err());
        assert!(validate_fargate_sizing(1024, 2500).is_err());
        assert!(validate_fargate_sizing(300, 1024).is_err());
    }

    #[test]
    fn fargate_cpu_accepts_strings() {
        assert!(fargate_cpu().validate(&Value::string("512")).is_ok());
        assert!(fargate_cpu().validate(&Value::string("500")).is_err());
        assert!(fargate_memory().validate(&Value::string("256")).is_err());
    }

    #[test]
    fn health_check_timing() {
        assert!(validate_health_check(300, 30).is_ok());
        assert!(validate_health_check(30, 30).is_err());
        assert!(validate_health_check(301, 30).is_err());
        assert!(validate_health_check(30, 1).is_err());
    }

    #[test]
    fn policy_document_shape() {
        let doc = Value::map([
            ("Version", Value::string("2012-10-17")),
            (
                "Statement",
                Value::List(vec![Value::map([
                    ("Effect", Value::string("Allow")),
                    ("Action", Value::string("s3:ListBucket")),
                    ("Resource", Value::string("*")),
                ])]),
            ),
        ]);
        assert!(policy_document().validate(&doc).is_ok());

        let missing_effect = Value::map([
            ("Version", Value::string("2012-10-17")),
            (
                "Statement",
                Value::List(vec![Value::map([("Action", Value::string("s3:*"))])]),
            ),
        ]);
        assert!(policy_document().validate(&missing_effect).is_err());
    }

    #[test]
    fn retention_days() {
        assert!(log_retention_days().validate(&Value::Int(30)).is_ok());
        assert!(log_retention_days().validate(&Value::Int(31)).is_err());
    }
}
