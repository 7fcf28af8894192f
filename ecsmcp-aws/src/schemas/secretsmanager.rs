//! Secrets Manager schema definitions

use std::collections::HashMap;

use ecsmcp_core::resource::Value;
use ecsmcp_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use super::AwsSchemaConfig;

/// secretsmanager.secret (AWS::SecretsManager::Secret)
pub fn secret_config() -> AwsSchemaConfig {
    AwsSchemaConfig::new(
        "AWS::SecretsManager::Secret",
        ResourceSchema::new("secretsmanager.secret")
            .attribute(
                AttributeSchema::new("name", AttributeType::String).with_provider_name("Name"),
            )
            .attribute(
                AttributeSchema::new("description", AttributeType::String)
                    .with_provider_name("Description"),
            )
            .attribute(
                AttributeSchema::new("generate_secret_string", AttributeType::Object)
                    .with_description("PasswordLength, ExcludePunctuation, ...")
                    .with_provider_name("GenerateSecretString"),
            )
            .attribute(
                AttributeSchema::new("secret_string", AttributeType::String)
                    .with_provider_name("SecretString"),
            ),
    )
    .with_check(one_value_source)
    .with_check(password_length)
}

fn one_value_source(attributes: &HashMap<String, Value>) -> Result<(), String> {
    if attributes.contains_key("generate_secret_string") && attributes.contains_key("secret_string")
    {
        Err("Secret cannot have both generate_secret_string and secret_string".to_string())
    } else {
        Ok(())
    }
}

fn password_length(attributes: &HashMap<String, Value>) -> Result<(), String> {
    let length = attributes
        .get("generate_secret_string")
        .and_then(Value::as_map)
        .and_then(|m| m.get("PasswordLength"))
        .and_then(Value::as_int);
    match length {
        Some(n) if !(1..=4096).contains(&n) => {
            Err(format!("PasswordLength {} must be between 1 and 4096", n))
        }
        _ => Ok(()),
    }
}

pub fn configs() -> Vec<AwsSchemaConfig> {
    vec![secret_config()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecsmcp_core::resource::Resource;

    #[test]
    fn generated_secret_validates() {
        let secret = Resource::new("secretsmanager.secret", "ApiSecret").with_attribute(
            "generate_secret_string",
            Value::map([("PasswordLength", Value::Int(20))]),
        );
        assert!(secret_config().validate(&secret).is_ok());
    }

    #[test]
    fn zero_length_is_rejected() {
        let secret = Resource::new("secretsmanager.secret", "ApiSecret").with_attribute(
            "generate_secret_string",
            Value::map([("PasswordLength", Value::Int(0))]),
        );
        assert!(secret_config().validate(&secret).is_err());
    }
}
