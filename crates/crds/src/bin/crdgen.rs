//! Prints the CustomResourceDefinition manifests as a multi-document YAML stream.

use crds::{UCloudCluster, UCloudMachine};
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    for crd in [UCloudCluster::crd(), UCloudMachine::crd()] {
        println!("---");
        print!("{}", serde_yaml::to_string(&crd)?);
    }
    Ok(())
}
