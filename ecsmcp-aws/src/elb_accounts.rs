//! Elastic Load Balancing log delivery principals
//!
//! Regions launched before August 2022 deliver access logs from a regional
//! AWS account; newer regions use the log-delivery service principal.

use ecsmcp_core::resource::Value;

const ELB_ACCOUNTS: &[(&str, &str)] = &[
    ("af-south-1", "098369216593"),
    ("ap-east-1", "754344448648"),
    ("ap-northeast-1", "582318560864"),
    ("ap-northeast-2", "600734575887"),
    ("ap-northeast-3", "383597477331"),
    ("ap-south-1", "718504428378"),
    ("ap-southeast-1", "114774131450"),
    ("ap-southeast-2", "783225319266"),
    ("ca-central-1", "985666609251"),
    ("eu-central-1", "054676820928"),
    ("eu-north-1", "897822967062"),
    ("eu-south-1", "635631232127"),
    ("eu-west-1", "156460612806"),
    ("eu-west-2", "652711504416"),
    ("eu-west-3", "009996457667"),
    ("me-south-1", "076674570225"),
    ("sa-east-1", "507241528517"),
    ("us-east-1", "127311923021"),
    ("us-east-2", "033677994240"),
    ("us-west-1", "027434742980"),
    ("us-west-2", "797873946194"),
];

pub const LOG_DELIVERY_SERVICE: &str = "logdelivery.elasticloadbalancing.amazonaws.com";

/// Regional ELB account, if the region has one
pub fn elb_account(region: &str) -> Option<&'static str> {
    ELB_ACCOUNTS
        .iter()
        .find(|(r, _)| *r == region)
        .map(|(_, account)| *account)
}

/// Principal allowed to write access logs in `region`
pub fn log_delivery_principal(region: &str) -> Value {
    match elb_account(region) {
        Some(account) => Value::map([(
            "AWS",
            Value::string(format!("arn:aws:iam::{}:root", account)),
        )]),
        None => Value::map([("Service", Value::string(LOG_DELIVERY_SERVICE))]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokyo_uses_regional_account() {
        assert_eq!(elb_account("ap-northeast-1"), Some("582318560864"));
        assert_eq!(
            log_delivery_principal("ap-northeast-1"),
            Value::map([("AWS", Value::string("arn:aws:iam::582318560864:root"))])
        );
    }

    #[test]
    fn unknown_region_uses_service_principal() {
        assert_eq!(
            log_delivery_principal("ap-southeast-5"),
            Value::map([("Service", Value::string(LOG_DELIVERY_SERVICE))])
        );
    }
}
