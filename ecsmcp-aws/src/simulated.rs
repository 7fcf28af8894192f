//! Simulated provider
//!
//! Keeps resources in memory and fabricates identifiers, ARNs and read-back
//! attributes in the shape AWS returns them. Generated secret values are kept
//! so listener routing can be evaluated against an applied stack.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use ecsmcp_core::provider::{BoxFuture, ErrorKind, Provider, ProviderError, ProviderResult};
use ecsmcp_core::resource::{Resource, ResourceId, State, Value};
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::routing::SecretStore;
use crate::schemas::config_for;

const PUNCTUATION: &str = "!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";
const DEFAULT_PASSWORD_LENGTH: i64 = 32;

struct Stored {
    id: ResourceId,
    attributes: HashMap<String, Value>,
}

#[derive(Default)]
struct Store {
    /// Provider identifier -> resource
    resources: HashMap<String, Stored>,
    /// Secret ARN and logical ID -> value
    secrets: HashMap<String, String>,
}

pub struct SimulatedProvider {
    account: String,
    region: String,
    rng: Mutex<StdRng>,
    store: Mutex<Store>,
}

impl SimulatedProvider {
    pub fn new(account: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            region: region.into(),
            rng: Mutex::new(StdRng::from_entropy()),
            store: Mutex::new(Store::default()),
        }
    }

    /// Deterministic identifiers and secrets
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn resource_count(&self) -> usize {
        self.store.lock().map(|s| s.resources.len()).unwrap_or(0)
    }

    /// Load resources recorded by an earlier run
    ///
    /// Secret values are not recorded, so restored secrets have none.
    pub fn restore<'a>(&self, states: impl IntoIterator<Item = &'a State>) -> ProviderResult<()> {
        let mut store = self.store()?;
        for state in states {
            let Some(identifier) = state.identifier.clone() else {
                continue;
            };
            let attributes = state
                .attributes
                .iter()
                .filter(|(k, _)| !k.starts_with('_'))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            store.resources.insert(
                identifier,
                Stored {
                    id: state.id.clone(),
                    attributes,
                },
            );
        }
        Ok(())
    }

    fn store(&self) -> ProviderResult<MutexGuard<'_, Store>> {
        self.store
            .lock()
            .map_err(|_| ProviderError::api("simulated store lock poisoned"))
    }

    fn rng(&self) -> MutexGuard<'_, StdRng> {
        match self.rng.lock() {
            Ok(rng) => rng,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn hex(&self, len: usize) -> String {
        let mut rng = self.rng();
        (0..len)
            .map(|_| char::from_digit(rng.gen_range(0..16), 16).unwrap_or('0'))
            .collect()
    }

    fn digits(&self, len: usize) -> String {
        let mut rng = self.rng();
        (0..len)
            .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
            .collect()
    }

    fn alphanumeric(&self, len: usize) -> String {
        let mut rng = self.rng();
        (&mut *rng)
            .sample_iter(&Alphanumeric)
            .take(len)
            .map(char::from)
            .collect()
    }

    fn password(&self, options: Option<&HashMap<String, Value>>) -> String {
        let flag = |key: &str| {
            options.and_then(|s| s.get(key))
                .and_then(Value::as_bool)
                .unwrap_or(false)
        };
        let length = options
            .and_then(|s| s.get("PasswordLength"))
            .and_then(Value::as_int)
            .unwrap_or(DEFAULT_PASSWORD_LENGTH);
        let excluded = options
            .and_then(|s| s.get("ExcludeCharacters"))
            .and_then(Value::as_str)
            .unwrap_or("");

        let mut charset: Vec<char> = ('a'..='z').chain('A'..='Z').chain('0'..='9').collect();
        if !flag("ExcludePunctuation") {
            charset.extend(PUNCTUATION.chars());
        }
        charset.retain(|c| !excluded.contains(*c));
        if charset.is_empty() {
            return String::new();
        }

        let mut rng = self.rng();
        (0..length)
            .map(|_| charset[rng.gen_range(0..charset.len())])
            .collect()
    }

    fn arn(&self, service: &str, resource: &str) -> String {
        format!("arn:aws:{}:{}:{}:{}", service, self.region, self.account, resource)
    }

    /// Physical name: the given name, or the logical ID with a random suffix
    fn physical_name(&self, resource: &Resource, attribute: &str) -> String {
        resource
            .get_str(attribute)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}-{}", resource.logical_id(), self.alphanumeric(12)))
    }

    /// Identifier and read-back attributes for a new resource
    fn fabricate(&self, resource: &Resource) -> ProviderResult<(String, HashMap<String, Value>)> {
        let mut computed: HashMap<String, Value> = HashMap::new();
        let mut set = |key: &str, value: String| {
            computed.insert(key.to_string(), Value::String(value));
        };

        let identifier = match resource.id.resource_type.as_str() {
            "s3.bucket" => {
                let name = self.physical_name(resource, "bucket_name").to_lowercase();
                set("arn", format!("arn:aws:s3:::{}", name));
                set("domain_name", format!("{}.s3.amazonaws.com", name));
                name
            }
            "s3.bucket_policy" => resource.get_str("bucket").unwrap_or_default().to_string(),
            "ec2.vpc" => self.ec2_id("vpc", "vpc_id", &mut set),
            "ec2.subnet" => self.ec2_id("subnet", "subnet_id", &mut set),
            "ec2.route_table" => self.ec2_id("rtb", "route_table_id", &mut set),
            "ec2.subnet_route_table_association" => format!("rtbassoc-{}", self.hex(17)),
            "ec2.route" => format!(
                "{}|{}",
                resource.get_str("route_table_id").unwrap_or_default(),
                resource.get_str("destination_cidr_block").unwrap_or_default()
            ),
            "ec2.internet_gateway" => self.ec2_id("igw", "internet_gateway_id", &mut set),
            "ec2.vpc_gateway_attachment" => format!(
                "IGW|{}",
                resource.get_str("vpc_id").unwrap_or_default()
            ),
            "ec2.eip" => {
                let ip = format!("203.0.113.{}", u8::from_str_radix(&self.hex(2), 16).unwrap_or(1));
                set("public_ip", ip.clone());
                set("allocation_id", format!("eipalloc-{}", self.hex(17)));
                ip
            }
            "ec2.nat_gateway" => self.ec2_id("nat", "nat_gateway_id", &mut set),
            "ec2.flow_log" => format!("fl-{}", self.hex(17)),
            "ec2.security_group" => self.ec2_id("sg", "group_id", &mut set),
            "ec2.security_group_ingress" => format!("sgr-{}", self.hex(17)),
            "ecs.cluster" => {
                let name = self.physical_name(resource, "cluster_name");
                set("arn", self.arn("ecs", &format!("cluster/{}", name)));
                name
            }
            "ecs.cluster_capacity_provider_associations" => {
                resource.get_str("cluster").unwrap_or_default().to_string()
            }
            "ecs.task_definition" => {
                let family = self.physical_name(resource, "family");
                let arn = self.arn("ecs", &format!("task-definition/{}:1", family));
                set("task_definition_arn", arn.clone());
                arn
            }
            "ecs.service" => {
                let name = format!("{}-{}", resource.logical_id(), self.alphanumeric(12));
                let cluster = resource
                    .get_str("cluster")
                    .and_then(|c| c.rsplit('/').next())
                    .unwrap_or("default");
                let arn = self.arn("ecs", &format!("service/{}/{}", cluster, name));
                set("name", name);
                set("service_arn", arn.clone());
                arn
            }
            "elbv2.load_balancer" => {
                let name = format!("{}-{}", truncate(resource.logical_id(), 16), self.alphanumeric(8));
                let full_name = format!("app/{}/{}", name, self.hex(16));
                set(
                    "dns_name",
                    format!("{}-{}.{}.elb.amazonaws.com", name, self.digits(10), self.region)
                        .to_lowercase(),
                );
                set("canonical_hosted_zone_id", format!("Z{}", self.alphanumeric(13).to_uppercase()));
                set("load_balancer_full_name", full_name.clone());
                self.arn("elasticloadbalancing", &format!("loadbalancer/{}", full_name))
            }
            "elbv2.listener" => self.arn(
                "elasticloadbalancing",
                &format!("listener/app/{}/{}", self.hex(16), self.hex(16)),
            ),
            "elbv2.listener_rule" => self.arn(
                "elasticloadbalancing",
                &format!("listener-rule/app/{}/{}", self.hex(16), self.hex(16)),
            ),
            "elbv2.target_group" => {
                let full_name = format!(
                    "targetgroup/{}-{}/{}",
                    truncate(resource.logical_id(), 16),
                    self.alphanumeric(8),
                    self.hex(16)
                );
                set("target_group_full_name", full_name.clone());
                self.arn("elasticloadbalancing", &full_name)
            }
            "iam.role" => {
                let name = self.physical_name(resource, "role_name");
                set("arn", format!("arn:aws:iam::{}:role/{}", self.account, name));
                set("role_id", format!("AROA{}", self.alphanumeric(17).to_uppercase()));
                name
            }
            "iam.policy" => format!(
                "{}-{}",
                truncate(resource.get_str("policy_name").unwrap_or("Policy"), 32),
                self.alphanumeric(12)
            ),
            "logs.log_group" => {
                let name = self.physical_name(resource, "log_group_name");
                set("arn", self.arn("logs", &format!("log-group:{}:*", name)));
                name
            }
            "secretsmanager.secret" => {
                let name = self.physical_name(resource, "name");
                self.arn("secretsmanager", &format!("secret:{}-{}", name, self.alphanumeric(6)))
            }
            "servicediscovery.http_namespace" => {
                let id = format!("ns-{}", self.alphanumeric(16).to_lowercase());
                set("id", id.clone());
                set("arn", self.arn("servicediscovery", &format!("namespace/{}", id)));
                id
            }
            "applicationautoscaling.scalable_target" => format!(
                "{}|{}|{}",
                resource.get_str("resource_id").unwrap_or_default(),
                resource.get_str("scalable_dimension").unwrap_or_default(),
                resource.get_str("service_namespace").unwrap_or_default()
            ),
            "applicationautoscaling.scaling_policy" => self.arn(
                "autoscaling",
                &format!(
                    "scalingPolicy:{}:resource/ecs/{}",
                    uuid_like(&self.hex(32)),
                    resource.get_str("policy_name").unwrap_or_default()
                ),
            ),
            other => {
                return Err(ProviderError::new(
                    ErrorKind::UnsupportedType,
                    format!("Unsupported resource type '{}'", other),
                )
                .for_resource(&resource.id));
            }
        };

        Ok((identifier, computed))
    }

    fn ec2_id(&self, prefix: &str, attribute: &str, set: &mut impl FnMut(&str, String)) -> String {
        let id = format!("{}-{}", prefix, self.hex(17));
        set(attribute, id.clone());
        id
    }

    fn validate(resource: &Resource) -> ProviderResult<()> {
        let Some(config) = config_for(&resource.id.resource_type) else {
            return Err(ProviderError::new(
                ErrorKind::UnsupportedType,
                format!("Unknown resource type '{}'", resource.id.resource_type),
            )
            .for_resource(&resource.id));
        };
        config.validate(resource).map_err(|errors| {
            let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
            ProviderError::invalid(format!("Validation failed: {}", messages.join("; ")))
                .for_resource(&resource.id)
        })
    }

    fn create_now(&self, resource: &Resource) -> ProviderResult<State> {
        Self::validate(resource)?;
        let (identifier, computed) = self.fabricate(resource)?;

        let mut store = self.store()?;
        if store.resources.contains_key(&identifier) {
            return Err(ProviderError::new(
                ErrorKind::AlreadyExists,
                format!("'{}' already exists", identifier),
            )
            .for_resource(&resource.id));
        }

        if resource.id.resource_type == "secretsmanager.secret" {
            let value = match resource.get_str("secret_string") {
                Some(given) => given.to_string(),
                None => self.password(resource.get("generate_secret_string").and_then(Value::as_map)),
            };
            store.secrets.insert(identifier.clone(), value.clone());
            store
                .secrets
                .insert(resource.logical_id().to_string(), value);
        }

        let mut attributes: HashMap<String, Value> = resource
            .provider_attributes()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        attributes.extend(computed.clone());
        store.resources.insert(
            identifier.clone(),
            Stored {
                id: resource.id.clone(),
                attributes,
            },
        );
        log::debug!("simulated create {} -> {}", resource.id, identifier);

        Ok(State::existing(resource.id.clone(), computed).with_identifier(identifier))
    }

    fn read_now(&self, id: &ResourceId, identifier: Option<&str>) -> ProviderResult<State> {
        let store = self.store()?;
        Ok(match identifier.and_then(|i| store.resources.get(i).map(|s| (i, s))) {
            Some((identifier, stored)) if stored.id == *id => {
                State::existing(id.clone(), stored.attributes.clone()).with_identifier(identifier)
            }
            _ => State::not_found(id.clone()),
        })
    }

    fn update_now(&self, id: &ResourceId, identifier: &str, to: &Resource) -> ProviderResult<State> {
        Self::validate(to)?;
        let mut store = self.store()?;
        let stored = store.resources.get_mut(identifier).ok_or_else(|| {
            ProviderError::not_found(format!("'{}' does not exist", identifier)).for_resource(id)
        })?;

        // Read-back attributes survive an in-place update
        let computed: HashMap<String, Value> = config_for(&id.resource_type)
            .map(|config| {
                stored
                    .attributes
                    .iter()
                    .filter(|(k, _)| config.schema.attributes.get(*k).is_some_and(|a| a.computed))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default();

        stored.attributes = to
            .provider_attributes()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        stored.attributes.extend(computed.clone());
        log::debug!("simulated update {} ({})", id, identifier);

        Ok(State::existing(id.clone(), computed).with_identifier(identifier))
    }

    fn delete_now(&self, id: &ResourceId, identifier: &str) -> ProviderResult<()> {
        let mut store = self.store()?;
        if store.resources.remove(identifier).is_none() {
            return Err(
                ProviderError::not_found(format!("'{}' does not exist", identifier)).for_resource(id)
            );
        }
        store.secrets.remove(identifier);
        store.secrets.remove(&id.name);
        log::debug!("simulated delete {} ({})", id, identifier);
        Ok(())
    }
}

impl Provider for SimulatedProvider {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn read(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let result = self.read_now(id, identifier);
        Box::pin(async move { result })
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let result = self.create_now(resource);
        Box::pin(async move { result })
    }

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        _from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let result = self.update_now(id, identifier, to);
        Box::pin(async move { result })
    }

    fn delete(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
        let result = self.delete_now(id, identifier);
        Box::pin(async move { result })
    }
}

impl SecretStore for SimulatedProvider {
    fn secret_string(&self, secret_id: &str) -> Option<String> {
        self.store.lock().ok()?.secrets.get(secret_id).cloned()
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn uuid_like(hex: &str) -> String {
    if hex.len() < 32 {
        return hex.to_string();
    }
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}
