use kube::CustomResourceExt;
use keydb_operator::crd::KeyDb;

fn main() -> Result<(), serde_yaml::Error> {
    print!("{}", serde_yaml::to_string(&KeyDb::crd())?);
    Ok(())
}
