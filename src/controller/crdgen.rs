//! # CRD Generator
//!
//! Prints the CustomResourceDefinition YAML of every deployment resource kind.
//!
//! ## Usage
//!
//! ```bash
//! # Generate CRD YAML
//! cargo run --bin crdgen > config/crd/deployment-manager.yaml
//!
//! # Generate and apply directly
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use anyhow::{Context, Result};
use deployment_manager_controller::crd::all_crds;

fn main() -> Result<()> {
    println!("# This file is auto-generated by crdgen");
    println!("# DO NOT EDIT THIS FILE MANUALLY");
    println!("#");
    for crd in all_crds() {
        let yaml = serde_yaml::to_string(&crd).context("Failed to serialize CRD to YAML")?;
        println!("---");
        print!("{yaml}");
    }
    Ok(())
}
