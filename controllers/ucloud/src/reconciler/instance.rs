//! UHost lifecycle
//!
//! Create: resolve bootstrap data, image, password and zone, create, then poll
//! every 30s until `Running` or the boot deadline passes.
//!
//! Terminate: describe (absent means done), power off and poll every 10s for
//! `Stopped`, terminate releasing EIPs and disks, poll every 10s until the
//! instance is no longer described. Each phase has its own deadline.
//!
//! Polls sleep first and check the deadline after every describe, so a phase
//! fails only once its full timeout has elapsed on the injected clock.

use super::Reconciler;
use super::{BOOT_POLL_INTERVAL, PHASE_TIMEOUT, STOP_POLL_INTERVAL};
use crate::clock::Clock;
use crate::config::{DEFAULT_DATA_DISK_SIZE, DEFAULT_ROOT_DISK_SIZE, DEFAULT_UHOST_CPU, DEFAULT_UHOST_MEMORY};
use crate::error::ControllerError;
use crate::scope::{ClusterView, MachineScope};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use crds::{MachineAddress, MachineAddressType};
use std::time::Duration;
use tracing::{debug, info};
use ucloud_client::{
    CreateUHostRequest, Credential, RequestContext, ResourceFilter, UHostDisk, UHostInstance, UHostState, retcode,
};

const DISK_TYPE: &str = "CLOUD_SSD";

/// Fixed-interval polling under a deadline read from the injected clock
struct Poller<'a> {
    clock: &'a dyn Clock,
    interval: Duration,
    deadline: Duration,
}

impl<'a> Poller<'a> {
    fn new(clock: &'a dyn Clock, interval: Duration, timeout: Duration) -> Self {
        Self {
            clock,
            interval,
            deadline: clock.now() + timeout,
        }
    }

    async fn wait(&self) {
        self.clock.sleep(self.interval).await;
    }

    fn expired(&self) -> bool {
        self.clock.now() >= self.deadline
    }
}

/// Decode the base64 login password
pub(crate) fn decode_password(encoded: &str) -> Result<String, ControllerError> {
    if encoded.is_empty() {
        return Err(ControllerError::InvalidCredential("password is not set".to_string()));
    }
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| ControllerError::InvalidCredential(format!("sshPassword is not a valid base64 string: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| ControllerError::InvalidCredential(format!("sshPassword is not valid UTF-8: {e}")))
}

/// Instance user data: the bootstrap payload with the credential and
/// Kubernetes version substituted, base64 encoded
pub(crate) fn render_user_data(bootstrap: &[u8], credential: &Credential, version: &str) -> Result<String, ControllerError> {
    let credential_json = serde_json::to_vec(credential)
        .map_err(|e| ControllerError::InvalidConfig(format!("cannot encode credential: {e}")))?;
    let rendered = String::from_utf8_lossy(bootstrap)
        .replace("## template: jinja", "")
        .replace("UCLOUD_CREDENTIAL", &STANDARD.encode(credential_json))
        .replace("KUBERNETES_VERSION", version);
    Ok(STANDARD.encode(rendered))
}

/// Machine addresses from the instance IP set
pub(crate) fn machine_addresses(instance: &UHostInstance) -> Vec<MachineAddress> {
    instance
        .ip_set
        .iter()
        .filter_map(|ip| {
            let address_type = match ip.ip_type.as_str() {
                "Private" => MachineAddressType::InternalIP,
                "Bgp" | "International" | "Internation" => MachineAddressType::ExternalIP,
                _ => return None,
            };
            Some(MachineAddress {
                address_type,
                address: ip.ip.clone(),
            })
        })
        .collect()
}

/// Default private address
pub(crate) fn private_ip(instance: &UHostInstance) -> String {
    instance
        .ip_set
        .iter()
        .find(|ip| ip.default == "true" && ip.ip_type == "Private")
        .map(|ip| ip.ip.clone())
        .unwrap_or_default()
}

/// Address on the given EIP line, compared case-insensitively
pub(crate) fn public_ip(instance: &UHostInstance, operator: &str) -> String {
    instance
        .ip_set
        .iter()
        .find(|ip| ip.ip_type.eq_ignore_ascii_case(operator))
        .map(|ip| ip.ip.clone())
        .unwrap_or_default()
}

/// Fields every instance this controller creates shares
pub(crate) fn base_request(
    cluster: &ClusterView<'_>,
    name: String,
    zone: String,
    image_id: String,
    password: String,
) -> CreateUHostRequest {
    CreateUHostRequest {
        zone,
        name,
        tag: cluster.tag(),
        charge_type: "Month".to_string(),
        quantity: 1,
        vpc_id: cluster.status.network.vpc.vpc_id.clone(),
        subnet_id: cluster.status.network.subnet.subnet_id.clone(),
        image_id,
        machine_type: "N".to_string(),
        minimal_cpu_platform: "Intel/Auto".to_string(),
        login_mode: "Password".to_string(),
        password,
        ..Default::default()
    }
}

pub(crate) fn disk(size: i32, is_boot: bool) -> UHostDisk {
    UHostDisk {
        size,
        disk_type: DISK_TYPE.to_string(),
        is_boot,
        backup_type: "NONE".to_string(),
    }
}

fn or_default(value: i32, default: i32) -> i32 {
    if value > 0 { value } else { default }
}

impl Reconciler {
    /// Describe one instance; an unknown id or the "not found" code yields `None`
    pub(crate) async fn describe_instance(
        &self,
        ctx: &RequestContext,
        tag: &str,
        zone: &str,
        instance_id: &str,
    ) -> Result<Option<UHostInstance>, ControllerError> {
        let filter = ResourceFilter::tagged(tag).in_zone(zone).with_id(instance_id);
        match self.cloud.describe_uhost_instances(ctx, &filter).await {
            Ok(hosts) => Ok(hosts.into_iter().find(|h| h.uhost_id == instance_id)),
            Err(e) if e.is_retcode(retcode::UHOST_NOT_FOUND) => Ok(None),
            Err(e) => Err(ControllerError::reconcile("uhost", instance_id, e.into())),
        }
    }

    /// The machine's instance, `None` when it has no provider id or the
    /// provider no longer knows it
    pub(crate) async fn instance_if_exists(
        &self,
        cluster: &ClusterView<'_>,
        machine: &MachineScope<'_>,
    ) -> Result<Option<UHostInstance>, ControllerError> {
        let Some(instance_id) = machine.instance_id() else {
            return Ok(None);
        };
        info!("Looking for uhost {} of machine {}", instance_id, machine);
        self.describe_instance(&cluster.identity.request_context(), &cluster.tag(), machine.zone(), &instance_id)
            .await
    }

    /// Zone of a new instance: the declared one, else a random zone of the region
    pub(crate) fn choose_zone(&self, region: &str, declared: &str) -> Result<String, ControllerError> {
        if !declared.is_empty() {
            return Ok(declared.to_string());
        }
        let zones = self.regions.zones(region)?;
        self.zones
            .choose(zones)
            .ok_or_else(|| ControllerError::UnsupportedRegion(region.to_string()))
    }

    /// Create the machine's instance and wait until it runs
    pub(crate) async fn create_instance(
        &self,
        cluster: &ClusterView<'_>,
        machine: &MachineScope<'_>,
    ) -> Result<UHostInstance, ControllerError> {
        let name = machine.instance_name();
        let wrap = |e: ControllerError| ControllerError::reconcile("uhost", name.clone(), e);
        let region = cluster.identity.region.as_str();

        let secret = machine.spec.bootstrap_data_secret_name.clone().unwrap_or_default();
        let bootstrap = self
            .secrets
            .get(&machine.namespace, &secret)
            .await
            .map_err(|source| wrap(ControllerError::BootstrapDataUnavailable { secret: secret.clone(), source }))?;

        let image_id = match machine.spec.image_id.as_deref() {
            Some(image) if !image.is_empty() => image.to_string(),
            _ => self.regions.image(region).map_err(wrap)?.to_string(),
        };
        let password = decode_password(&machine.spec.ssh_password).map_err(wrap)?;
        let zone = self.choose_zone(region, machine.zone()).map_err(wrap)?;
        let version = machine.spec.version.as_deref().unwrap_or(&cluster.spec.version);
        let user_data = render_user_data(&bootstrap, &self.credential, version).map_err(wrap)?;

        let mut request = base_request(cluster, name.clone(), zone, image_id, password);
        request.cpu = or_default(machine.spec.cpu, DEFAULT_UHOST_CPU);
        request.memory = or_default(machine.spec.memory, DEFAULT_UHOST_MEMORY);
        request.disks = vec![
            disk(or_default(machine.spec.root_disk_size, DEFAULT_ROOT_DISK_SIZE), true),
            disk(or_default(machine.spec.data_disk_size, DEFAULT_DATA_DISK_SIZE), false),
        ];
        request.user_data = Some(user_data);
        debug!("Creating uhost {:?}", request);

        let ctx = cluster.identity.request_context();
        let instance_id = self
            .cloud
            .create_uhost_instance(&ctx, &request)
            .await
            .map_err(|e| wrap(e.into()))?;
        info!("Created uhost {} ({}) in {}, waiting for it to run", name, instance_id, request.zone);

        self.wait_running(&ctx, &request.tag, &request.zone, &instance_id).await
    }

    async fn wait_running(
        &self,
        ctx: &RequestContext,
        tag: &str,
        zone: &str,
        instance_id: &str,
    ) -> Result<UHostInstance, ControllerError> {
        let poller = Poller::new(&*self.clock, BOOT_POLL_INTERVAL, PHASE_TIMEOUT);
        loop {
            poller.wait().await;
            info!("Waiting for uhost {} running", instance_id);
            if let Some(host) = self.describe_instance(ctx, tag, zone, instance_id).await? {
                if host.lifecycle_state() == UHostState::Running {
                    info!("uhost {} is running", instance_id);
                    return Ok(host);
                }
                debug!("uhost {} is {:?}", instance_id, host.state);
            }
            if poller.expired() {
                return Err(ControllerError::reconcile(
                    "uhost",
                    instance_id,
                    ControllerError::InstanceBootTimeout {
                        instance_id: instance_id.to_string(),
                        timeout: PHASE_TIMEOUT,
                    },
                ));
            }
        }
    }

    /// Power off and terminate an instance, waiting for each step
    pub(crate) async fn terminate_instance(
        &self,
        ctx: &RequestContext,
        tag: &str,
        instance_id: &str,
        zone: &str,
    ) -> Result<(), ControllerError> {
        let wrap = |e: ControllerError| ControllerError::reconcile("uhost", instance_id, e);
        if self.describe_instance(ctx, tag, zone, instance_id).await?.is_none() {
            info!("uhost {} is already gone", instance_id);
            return Ok(());
        }

        info!("Powering off uhost {}", instance_id);
        self.cloud
            .poweroff_uhost_instance(ctx, zone, instance_id)
            .await
            .map_err(|e| wrap(e.into()))?;
        let poller = Poller::new(&*self.clock, STOP_POLL_INTERVAL, PHASE_TIMEOUT);
        loop {
            poller.wait().await;
            info!("Waiting for uhost {} stopped", instance_id);
            match self.describe_instance(ctx, tag, zone, instance_id).await? {
                None => {
                    info!("uhost {} disappeared while stopping", instance_id);
                    return Ok(());
                }
                Some(host) if host.lifecycle_state() == UHostState::Stopped => break,
                Some(_) => {}
            }
            if poller.expired() {
                return Err(wrap(ControllerError::InstancePowerOffTimeout {
                    instance_id: instance_id.to_string(),
                    timeout: PHASE_TIMEOUT,
                }));
            }
        }

        info!("Terminating uhost {}", instance_id);
        self.cloud
            .terminate_uhost_instance(ctx, zone, instance_id, true, true)
            .await
            .map_err(|e| wrap(e.into()))?;
        let poller = Poller::new(&*self.clock, STOP_POLL_INTERVAL, PHASE_TIMEOUT);
        loop {
            poller.wait().await;
            info!("Waiting for uhost {} deleted", instance_id);
            if self.describe_instance(ctx, tag, zone, instance_id).await?.is_none() {
                info!("Terminated uhost {}", instance_id);
                return Ok(());
            }
            if poller.expired() {
                return Err(wrap(ControllerError::InstanceTerminateTimeout {
                    instance_id: instance_id.to_string(),
                    timeout: PHASE_TIMEOUT,
                }));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ucloud_client::UHostIp;

    #[test]
    fn test_decode_password() {
        assert_eq!(decode_password("cGFzc3dvcmQ=").unwrap(), "password");
        assert!(matches!(decode_password(""), Err(ControllerError::InvalidCredential(_))));
        assert!(matches!(decode_password("not base64!"), Err(ControllerError::InvalidCredential(_))));
    }

    #[test]
    fn test_user_data_substitution() {
        let credential = Credential {
            public_key: "pub".to_string(),
            private_key: "pri".to_string(),
        };
        let encoded =
            render_user_data(b"## template: jinja\nkey=UCLOUD_CREDENTIAL\nv=KUBERNETES_VERSION\n", &credential, "v1.18.3")
                .unwrap();
        let decoded = String::from_utf8(STANDARD.decode(encoded).unwrap()).unwrap();

        let expected_credential = STANDARD.encode(r#"{"PublicKey":"pub","PrivateKey":"pri"}"#);
        assert_eq!(decoded, format!("\nkey={expected_credential}\nv=v1.18.3\n"));
    }

    #[test]
    fn test_address_mapping() {
        let instance = UHostInstance {
            ip_set: vec![
                UHostIp { ip_type: "Private".into(), ip: "10.0.0.5".into(), default: "true".into() },
                UHostIp { ip_type: "Internation".into(), ip: "1.2.3.4".into(), default: "false".into() },
                UHostIp { ip_type: "Duplet".into(), ip: "5.6.7.8".into(), default: "false".into() },
            ],
            ..Default::default()
        };
        let addresses = machine_addresses(&instance);
        assert_eq!(addresses.len(), 2);
        assert_eq!(addresses[0].address_type, MachineAddressType::InternalIP);
        assert_eq!(addresses[1].address_type, MachineAddressType::ExternalIP);
        assert_eq!(private_ip(&instance), "10.0.0.5");
        assert_eq!(public_ip(&instance, "internation"), "1.2.3.4");
        assert_eq!(public_ip(&instance, "Bgp"), "");
    }
}
