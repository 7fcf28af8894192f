//! Access-log bucket shared by the VPC flow log and the load balancer

use ecsmcp_aws::iam::{PolicyDocument, PolicyStatement};
use ecsmcp_core::construct::ConstructPath;
use ecsmcp_core::resource::{DeletionPolicy, Suppression, Value};

use crate::error::StackError;
use crate::scope::{Scope, declare};

pub struct Storage {
    pub bucket: String,
    pub policy: String,
    document: PolicyDocument,
}

impl Storage {
    /// Private, encrypted bucket whose policy refuses plain HTTP
    pub fn new(scope: &mut Scope, path: &ConstructPath) -> Result<Self, StackError> {
        let bucket_path = path.child("AccessLogs");

        let mut bucket = declare(&bucket_path, "s3.bucket")
            .with_attribute(
                "bucket_encryption",
                Value::map([(
                    "ServerSideEncryptionConfiguration",
                    Value::List(vec![Value::map([(
                        "ServerSideEncryptionByDefault",
                        Value::map([("SSEAlgorithm", Value::string("AES256"))]),
                    )])]),
                )]),
            )
            .with_attribute(
                "public_access_block_configuration",
                Value::map([
                    ("BlockPublicAcls", Value::Bool(true)),
                    ("BlockPublicPolicy", Value::Bool(true)),
                    ("IgnorePublicAcls", Value::Bool(true)),
                    ("RestrictPublicBuckets", Value::Bool(true)),
                ]),
            )
            .with_deletion_policy(DeletionPolicy::Retain);
        bucket.add_suppression(Suppression::new(
            "AwsSolutions-S1",
            "Access Logs bucket doesn't need server access logs",
        ));
        let bucket = scope.add(bucket);

        let document = PolicyDocument::new().statement(
            PolicyStatement::deny()
                .with_principal(Value::map([("AWS", Value::string("*"))]))
                .with_actions(["s3:*"])
                .with_resources([
                    Value::attr_of(&bucket, "arn"),
                    objects_under(&bucket, "*"),
                ])
                .with_condition(Value::map([(
                    "Bool",
                    Value::map([("aws:SecureTransport", Value::string("false"))]),
                )])),
        );
        let policy = scope.add(
            declare(&bucket_path.child("Policy"), "s3.bucket_policy")
                .with_attribute("bucket", Value::ref_of(&bucket))
                .with_attribute("policy_document", document.to_value()),
        );

        Ok(Self {
            bucket,
            policy,
            document,
        })
    }

    pub fn bucket_arn(&self) -> Value {
        Value::attr_of(&self.bucket, "arn")
    }

    /// ARN of the objects matching `key` (e.g. `elb-logs/*`)
    pub fn arn_for_objects(&self, key: &str) -> Value {
        objects_under(&self.bucket, key)
    }

    /// Append a statement to the bucket policy
    pub fn add_to_resource_policy(
        &mut self,
        scope: &mut Scope,
        statement: PolicyStatement,
    ) -> Result<(), StackError> {
        self.document = std::mem::take(&mut self.document).statement(statement);
        scope
            .resource_mut(&self.policy)?
            .set("policy_document", self.document.to_value());
        Ok(())
    }
}

fn objects_under(bucket: &str, key: &str) -> Value {
    Value::Join(vec![
        Value::attr_of(bucket, "arn"),
        Value::string(format!("/{}", key)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use ecsmcp_aws::iam::statements_of;

    fn build() -> (Scope, Storage) {
        let mut scope = Scope::new("Test", Environment::new(None, "us-east-1"));
        let storage = Storage::new(&mut scope, &ConstructPath::parse("Storage")).unwrap();
        (scope, storage)
    }

    #[test]
    fn bucket_is_retained_and_private() {
        let (scope, storage) = build();
        let bucket = scope.resource(&storage.bucket).unwrap();
        assert_eq!(bucket.deletion_policy(), DeletionPolicy::Retain);
        assert!(bucket.is_suppressed("AwsSolutions-S1"));
        let block = bucket.get("public_access_block_configuration").unwrap();
        assert_eq!(
            block.as_map().unwrap().get("BlockPublicPolicy"),
            Some(&Value::Bool(true))
        );
    }

    #[test]
    fn policy_denies_insecure_transport() {
        let (scope, storage) = build();
        let policy = scope.resource(&storage.policy).unwrap();
        assert_eq!(policy.get("bucket"), Some(&Value::ref_of(&storage.bucket)));
        let document = policy.get("policy_document").unwrap();
        assert_eq!(statements_of(document).len(), 1);
        let nag = ecsmcp_aws::nag::check(scope.resources());
        assert!(nag.unsuppressed().is_empty());
    }

    #[test]
    fn statements_are_appended() {
        let (mut scope, mut storage) = build();
        let statement = PolicyStatement::allow()
            .with_actions(["s3:PutObject"])
            .with_resources([storage.arn_for_objects("elb-logs/*")]);
        storage.add_to_resource_policy(&mut scope, statement).unwrap();

        let document = scope
            .resource(&storage.policy)
            .and_then(|p| p.get("policy_document"))
            .unwrap();
        assert_eq!(statements_of(document).len(), 2);
    }
}
