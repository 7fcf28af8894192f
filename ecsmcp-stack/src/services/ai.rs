//! AI agent service
//!
//! The agent runs in the shared `AISG` group and is the only service reachable
//! from the internet. The load balancer answers 403 unless the request carries
//! the generated API key in `x-api-key`.

use std::path::Path;

use ecsmcp_aws::iam::PolicyDocument;
use ecsmcp_aws::template::Output;
use ecsmcp_core::construct::ConstructPath;
use ecsmcp_core::resource::{Suppression, Value};

use crate::constructs::ecs_cluster::EcsCluster;
use crate::constructs::ecs_service::{EcsService, EcsServiceProps};
use crate::constructs::load_balancer::{HTTP_PORT, LoadBalancer};
use crate::constructs::networking::Networking;
use crate::error::StackError;
use crate::scope::{Scope, declare};
use crate::services::{SERVICE_PORT, ServiceDetails, image_asset, task_role};

pub const SERVICE_NAME: &str = "ai-agent";
pub const API_KEY_HEADER: &str = "x-api-key";
pub const API_KEY_LENGTH: i64 = 20;
pub const FORBIDDEN_BODY: &str = r#"{"error":"Forbidden"}"#;
pub const SECRET_OUTPUT: &str = "SecretARN";
pub const HEALTH_CHECK_INTERVAL_SECONDS: i64 = 300;
pub const HEALTH_CHECK_TIMEOUT_SECONDS: i64 = 30;

pub struct AiServiceProps<'a> {
    pub cluster: &'a EcsCluster,
    pub networking: &'a Networking,
    pub load_balancer: &'a LoadBalancer,
    pub mcp_one: &'a ServiceDetails,
    pub mcp_two: &'a ServiceDetails,
    pub services_dir: &'a Path,
}

pub struct AiService {
    pub details: ServiceDetails,
    pub task_role: String,
    pub service: EcsService,
    pub listener: String,
    pub target_group: String,
    pub secret: String,
    pub rule: String,
}

impl AiService {
    pub fn new(scope: &mut Scope, props: AiServiceProps<'_>) -> Result<Self, StackError> {
        let path = ConstructPath::root().child("AiService");
        let ai_security_group = &props.networking.ai_security_group;

        let image = image_asset(
            scope,
            &path.child("AIServiceImage"),
            props.services_dir,
            SERVICE_NAME,
        )?;

        let bedrock = PolicyDocument::new().allow(
            [
                "bedrock:InvokeModel",
                "bedrock:InvokeModelWithResponseStream",
                "bedrock:Converse",
                "bedrock:ConverseStream",
            ],
            [Value::string("*")],
        );
        let task_role = task_role(scope, &path, vec![("BedrockAccess", bedrock)]);
        scope.resource_mut(&task_role)?.add_suppression(Suppression::new(
            "AwsSolutions-IAM5",
            "Wildcard required for access to Bedrock's FMs",
        ));

        let service = EcsService::new(
            scope,
            &path.child("ECSService"),
            EcsServiceProps::new(
                props.cluster,
                props.networking,
                &task_role,
                image,
                SERVICE_NAME,
            )
            .with_port(SERVICE_PORT)
            .with_security_group(ai_security_group)
            .with_environment("MCP_SERVICE_ONE_NAME", &props.mcp_one.service_name)
            .with_environment("MCP_SERVICE_ONE_PORT", props.mcp_one.service_port.to_string())
            .with_environment("MCP_SERVICE_TWO_NAME", &props.mcp_two.service_name)
            .with_environment("MCP_SERVICE_TWO_PORT", props.mcp_two.service_port.to_string()),
        )?;
        scope.resource_mut(&service.task_definition)?.add_suppression(Suppression::new(
            "AwsSolutions-ECS2",
            "Environment do not contain any sensitive information, just host names and ports to be used for service-to-service calls",
        ));

        // ALB and agent may talk to each other on the service port
        props.load_balancer.security_group.allow_from(
            scope,
            ai_security_group,
            SERVICE_PORT,
            &format!("from {}:{}", ai_security_group.id, SERVICE_PORT),
        )?;
        ai_security_group.allow_from(
            scope,
            &props.load_balancer.security_group,
            SERVICE_PORT,
            "Load balancer to target",
        )?;

        let listener_path = path.child("Port80Listener");
        let listener = scope.add(
            declare(&listener_path, "elbv2.listener")
                .with_attribute("load_balancer_arn", props.load_balancer.arn())
                .with_attribute("port", Value::Int(HTTP_PORT))
                .with_attribute("protocol", "HTTP")
                .with_attribute(
                    "default_actions",
                    Value::List(vec![Value::map([
                        ("Type", Value::string("fixed-response")),
                        (
                            "FixedResponseConfig",
                            Value::map([
                                ("StatusCode", Value::string("403")),
                                ("ContentType", Value::string("application/json")),
                                ("MessageBody", Value::string(FORBIDDEN_BODY)),
                            ]),
                        ),
                    ])]),
                ),
        );

        let target_group = scope.add(
            declare(&path.child("ATG"), "elbv2.target_group")
                .with_attribute("port", Value::Int(SERVICE_PORT))
                .with_attribute("protocol", "HTTP")
                .with_attribute("target_type", "ip")
                .with_attribute("vpc_id", Value::ref_of(&props.networking.vpc))
                .with_attribute("health_check_path", "/")
                .with_attribute(
                    "health_check_interval_seconds",
                    Value::Int(HEALTH_CHECK_INTERVAL_SECONDS),
                )
                .with_attribute(
                    "health_check_timeout_seconds",
                    Value::Int(HEALTH_CHECK_TIMEOUT_SECONDS),
                )
                .with_attribute("matcher", Value::map([("HttpCode", Value::string("200"))]))
                .with_attribute(
                    "target_group_attributes",
                    Value::List(vec![Value::map([
                        ("Key", Value::string("stickiness.enabled")),
                        ("Value", Value::string("false")),
                    ])]),
                ),
        );

        let mut secret = declare(&path.child("APISecret"), "secretsmanager.secret").with_attribute(
            "generate_secret_string",
            Value::map([("PasswordLength", Value::Int(API_KEY_LENGTH))]),
        );
        secret.add_suppression(Suppression::new(
            "AwsSolutions-SMG4",
            "Secret rotation is not needed for this sample",
        ));
        let secret = scope.add(secret);

        // The key only appears as a dynamic reference, resolved by the provider
        let api_key = Value::Join(vec![
            Value::string("{{resolve:secretsmanager:"),
            Value::ref_of(&secret),
            Value::string(":SecretString:::}}"),
        ]);
        let rule = scope.add(
            declare(&listener_path.child("TGRule"), "elbv2.listener_rule")
                .with_attribute("listener_arn", Value::ref_of(&listener))
                .with_attribute("priority", Value::Int(1))
                .with_attribute(
                    "conditions",
                    Value::List(vec![
                        Value::map([
                            ("Field", Value::string("http-header")),
                            (
                                "HttpHeaderConfig",
                                Value::map([
                                    ("HttpHeaderName", Value::string(API_KEY_HEADER)),
                                    ("Values", Value::List(vec![api_key])),
                                ]),
                            ),
                        ]),
                        Value::map([
                            ("Field", Value::string("path-pattern")),
                            (
                                "PathPatternConfig",
                                Value::map([("Values", Value::strings(["/*"]))]),
                            ),
                        ]),
                    ]),
                )
                .with_attribute(
                    "actions",
                    Value::List(vec![Value::map([
                        ("Type", Value::string("forward")),
                        ("TargetGroupArn", Value::ref_of(&target_group)),
                    ])]),
                ),
        );

        // Registering a target needs the target group attached to a listener
        service.attach_to_target_group(scope, &target_group)?;
        scope.add_dependency(&service.service, &rule)?;

        scope.add_output(Output::new(SECRET_OUTPUT, Value::ref_of(&secret)));

        Ok(Self {
            details: ServiceDetails {
                service_name: SERVICE_NAME.to_string(),
                service_port: SERVICE_PORT,
            },
            task_role,
            service,
            listener,
            target_group,
            secret,
            rule,
        })
    }
}
