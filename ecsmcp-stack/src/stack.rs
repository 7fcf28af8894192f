//! Stack - The composition root
//!
//! Builds every construct exactly once, in dependency order:
//! storage, networking, cluster and load balancer, the two MCP services, and
//! finally the AI service that fronts them.

use log::info;

use ecsmcp_aws::nag::{self, NagReport};
use ecsmcp_aws::template::{Output, synthesize};
use ecsmcp_aws::validate_resources;
use ecsmcp_core::construct::ConstructPath;
use ecsmcp_core::graph::DependencyGraph;
use ecsmcp_core::resolve::Bindings;
use ecsmcp_core::resource::Resource;

use crate::assets::{AssetManifest, ImageAsset};
use crate::config::{Environment, StackConfig};
use crate::constructs::ecs_cluster::{EcsCluster, EcsClusterProps};
use crate::constructs::load_balancer::LoadBalancer;
use crate::constructs::networking::{Networking, NetworkingProps};
use crate::constructs::storage::Storage;
use crate::error::StackError;
use crate::scope::Scope;
use crate::services::{AiService, AiServiceProps, McpService, McpServiceProps};

pub const TEMPLATE_DESCRIPTION: &str = "ECS MCP server sample: AI agent and MCP servers on Fargate";

/// Everything the stack declares
#[derive(Debug)]
pub struct SynthesizedStack {
    pub name: String,
    pub environment: Environment,
    pub resources: Vec<Resource>,
    pub outputs: Vec<Output>,
    pub assets: Vec<ImageAsset>,
}

/// Build the stack described by `config`
pub fn build(config: &StackConfig) -> Result<SynthesizedStack, StackError> {
    let environment = config.environment()?;
    info!(
        "Building {} for {} ({})",
        config.stack_name,
        environment.region,
        environment.account.as_deref().unwrap_or("unknown account")
    );
    let mut scope = Scope::new(&config.stack_name, environment.clone());
    let root = ConstructPath::root();

    let mut storage = Storage::new(&mut scope, &root.child("Storage"))?;
    let networking = Networking::new(
        &mut scope,
        &root.child("Networking"),
        NetworkingProps {
            cidr: Some(config.vpc_cidr.clone()),
        },
        &mut storage,
    )?;
    let cluster = EcsCluster::new(
        &mut scope,
        &root.child("ECS"),
        EcsClusterProps {
            namespace: &config.namespace,
        },
    )?;
    let load_balancer = LoadBalancer::new(&mut scope, &networking, &mut storage)?;

    let mcp_props = McpServiceProps {
        cluster: &cluster,
        networking: &networking,
        services_dir: &config.services_dir,
    };
    let mcp_one = McpService::one(&mut scope, &mcp_props)?;
    let mcp_two = McpService::two(&mut scope, &mcp_props)?;

    AiService::new(
        &mut scope,
        AiServiceProps {
            cluster: &cluster,
            networking: &networking,
            load_balancer: &load_balancer,
            mcp_one: &mcp_one.details,
            mcp_two: &mcp_two.details,
            services_dir: &config.services_dir,
        },
    )?;

    let (resources, outputs, assets) = scope.into_parts();
    info!("{} declared {} resources", config.stack_name, resources.len());
    Ok(SynthesizedStack {
        name: config.stack_name.clone(),
        environment,
        resources,
        outputs,
        assets,
    })
}

impl SynthesizedStack {
    pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.logical_id() == logical_id)
    }

    pub fn resources_of_type<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = &'a Resource> {
        self.resources
            .iter()
            .filter(move |r| r.id.resource_type == resource_type)
    }

    pub fn output(&self, name: &str) -> Option<&Output> {
        self.outputs.iter().find(|o| o.name == name)
    }

    /// Schemas, dependency graph and rule pack
    ///
    /// Returns the rule pack report (suppressed findings included) when
    /// nothing is left unsuppressed.
    pub fn validate(&self) -> Result<NagReport, StackError> {
        validate_resources(&self.resources).map_err(StackError::Schema)?;

        let graph = DependencyGraph::from_resources(&self.resources)?;
        graph.topological_order()?;

        let report = nag::check(&self.resources);
        let unsuppressed: Vec<_> = report.unsuppressed().into_iter().cloned().collect();
        if !unsuppressed.is_empty() {
            return Err(StackError::Nag(unsuppressed));
        }
        Ok(report)
    }

    /// CloudFormation template of the stack
    pub fn template(&self) -> Result<serde_json::Value, StackError> {
        Ok(synthesize(
            &self.resources,
            &self.outputs,
            Some(TEMPLATE_DESCRIPTION),
        )?)
    }

    pub fn asset_manifest(&self) -> AssetManifest {
        AssetManifest::new(&self.assets, &self.environment)
    }

    /// Pseudo parameters for resolving references against `account`
    pub fn bindings(&self, account: &str) -> Bindings {
        Bindings::new()
            .with_pseudo("AccountId", account)
            .with_pseudo("Region", self.environment.region.as_str())
            .with_pseudo("Partition", "aws")
            .with_pseudo("URLSuffix", "amazonaws.com")
    }
}
