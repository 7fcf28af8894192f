//! Case conversion between resource attribute names and CloudFormation names
//!
//! Attributes are snake_case (`vpc_id`), CloudFormation uses PascalCase
//! (`VpcId`). Acronyms round-trip through snake_case (`DNSName` -> `dns_name`),
//! so schemas spell them out with `with_provider_name` where needed.

use heck::{ToSnakeCase, ToUpperCamelCase};

/// "bucket_name" -> "BucketName"
pub fn to_pascal_case(s: &str) -> String {
    s.to_upper_camel_case()
}

/// "LoadBalancerFullName" -> "load_balancer_full_name"
pub fn to_snake_case(s: &str) -> String {
    s.to_snake_case()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_to_pascal() {
        assert_eq!(to_pascal_case("bucket_name"), "BucketName");
        assert_eq!(to_pascal_case("arn"), "Arn");
        assert_eq!(to_pascal_case("health_check_interval_seconds"), "HealthCheckIntervalSeconds");
    }

    #[test]
    fn pascal_to_snake() {
        assert_eq!(to_snake_case("VpcId"), "vpc_id");
        assert_eq!(to_snake_case("DNSName"), "dns_name");
        assert_eq!(to_snake_case("LoadBalancerFullName"), "load_balancer_full_name");
    }
}
