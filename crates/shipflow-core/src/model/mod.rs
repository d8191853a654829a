//! モデル定義
//!
//! ShipFlowで使用されるデータモデルを定義します。
//! 各モデルは機能ごとにモジュールに分離されています。

mod command;
mod container;
mod file;
mod project;
mod server;

// Re-exports
pub use command::*;
pub use container::*;
pub use file::*;
pub use project::*;
pub use server::*;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn sample_project() -> Project {
        let mut servers = BTreeMap::new();
        servers.insert(
            "dev".to_string(),
            ServerSpec {
                host: "projectname-dev".to_string(),
                version: "0.0.1".to_string(),
                env: "dev".to_string(),
                ..Default::default()
            },
        );

        Project {
            name: "projectname".to_string(),
            root: PathBuf::from("/srv/projectname"),
            work_dir: PathBuf::from("/srv/projectname"),
            temp_dir: PathBuf::from("/tmp/projectname-deploy-tmp"),
            archive_name: "projectname.dist.tar.gz".to_string(),
            destination_dir: "projectname".to_string(),
            servers,
            ..Default::default()
        }
    }

    #[test]
    fn test_temp_layout() {
        let project = sample_project();
        let layout = project.temp_layout();

        assert_eq!(layout.root, PathBuf::from("/tmp/projectname-deploy-tmp"));
        assert_eq!(
            layout.environment,
            PathBuf::from("/tmp/projectname-deploy-tmp/environment")
        );
        assert_eq!(
            layout.containers,
            PathBuf::from("/tmp/projectname-deploy-tmp/containers")
        );
        assert_eq!(
            layout.archives,
            PathBuf::from("/tmp/projectname-deploy-tmp/archives")
        );
    }

    #[test]
    fn test_server_lookup() {
        let project = sample_project();
        assert_eq!(project.server("dev").unwrap().host, "projectname-dev");

        let err = project.server("prod").unwrap_err();
        assert!(err.to_string().contains("dev"));
    }

    #[test]
    fn test_destination_dir_server_override() {
        let mut project = sample_project();
        assert_eq!(
            project.destination_dir_for(project.server("dev").unwrap()),
            "projectname"
        );

        project.servers.get_mut("dev").unwrap().destination_dir = Some("/opt/app".to_string());
        assert_eq!(
            project.destination_dir_for(project.server("dev").unwrap()),
            "/opt/app"
        );
    }
}
