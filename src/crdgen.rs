use capacity_controllers::api::v1::{capacity_target::CapacityTarget, release::Release};
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    println!("---");
    print!("{}", serde_yaml::to_string(&Release::crd())?);
    println!("---");
    print!("{}", serde_yaml::to_string(&CapacityTarget::crd())?);
    Ok(())
}
