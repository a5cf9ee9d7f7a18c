//! Network reconcilers
//!
//! Handles: VPC, Subnet, NAT gateway, load balancer, plus the firewall
//! lookup and elastic IP allocation they depend on.

pub mod eip;
pub mod firewall;
pub mod nat;
pub mod subnet;
pub mod ulb;
pub mod vpc;


pub(crate) use nat::NatGatewayKind;
pub(crate) use subnet::SubnetKind;
pub(crate) use ulb::LoadBalancerKind;
pub(crate) use vpc::VpcKind;
