//! # CRD Generator
//!
//! Prints the `CnsNodeVmAttachment` CustomResourceDefinition as YAML.
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/cnsnodevmattachment.yaml
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use cns_attachment_controller::crd::CnsNodeVmAttachment;
use kube::core::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&CnsNodeVmAttachment::crd())?);
    Ok(())
}
