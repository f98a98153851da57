//! Docker daemon implementation of [`ContainerEngine`] using bollard.

use super::registry::RegistryLogin;
use super::traits::ContainerEngine;
use crate::models::split_reference;
use crate::{MigraptorError, Result};
use async_trait::async_trait;
use bollard::auth::DockerCredentials;
use bollard::image::{CreateImageOptions, PushImageOptions, TagImageOptions};
use bollard::Docker;
use futures::StreamExt;
use tracing::{debug, info};

/// Credentials sent to the registry on every pull and push.
#[derive(Clone, Default)]
pub struct RegistryCredentials {
    pub server: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryCredentials")
            .field("server", &self.server)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl RegistryCredentials {
    fn to_docker(&self) -> DockerCredentials {
        DockerCredentials {
            username: Some(self.username.clone()),
            password: Some(self.password.clone()),
            serveraddress: Some(self.server.clone()),
            ..Default::default()
        }
    }
}

/// Container engine backed by the local Docker daemon.
pub struct DockerEngine {
    docker: Docker,
    credentials: Option<RegistryCredentials>,
}

impl DockerEngine {
    /// Connect using the platform defaults (`DOCKER_HOST` or the local socket).
    pub fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults().map_err(|e| MigraptorError::Engine {
            message: format!("Failed to connect to Docker: {}", e),
        })?;
        info!("Docker client created");
        Ok(Self {
            docker,
            credentials: None,
        })
    }

    /// Authenticate registry operations with `credentials`.
    pub fn with_credentials(mut self, credentials: RegistryCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Check the registry credentials the way `docker login` does. Without
    /// credentials there is nothing to check.
    pub async fn login(&self) -> Result<()> {
        match &self.credentials {
            Some(credentials) => {
                RegistryLogin::new(&credentials.server)?
                    .verify(credentials)
                    .await
            }
            None => Ok(()),
        }
    }

    fn docker_credentials(&self) -> Option<DockerCredentials> {
        self.credentials.as_ref().map(RegistryCredentials::to_docker)
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn ping(&self) -> Result<()> {
        self.docker
            .ping()
            .await
            .map_err(|e| MigraptorError::Engine {
                message: format!("Docker daemon is not running: {}", e),
            })?;
        Ok(())
    }

    async fn pull(&self, reference: &str) -> Result<()> {
        let (repository, tag) = split_reference(reference);
        let options = CreateImageOptions {
            from_image: repository,
            tag,
            ..Default::default()
        };

        let mut stream = self
            .docker
            .create_image(Some(options), None, self.docker_credentials());
        while let Some(progress) = stream.next().await {
            let progress = progress.map_err(|e| MigraptorError::Engine {
                message: format!("Failed to pull image {}: {}", reference, e),
            })?;
            if let Some(status) = progress.status {
                debug!("pull {}: {}", reference, status);
            }
        }
        Ok(())
    }

    async fn tag(&self, source: &str, target: &str) -> Result<()> {
        let (repo, tag) = split_reference(target);
        self.docker
            .tag_image(source, Some(TagImageOptions { repo, tag }))
            .await
            .map_err(|e| MigraptorError::Engine {
                message: format!("Failed to tag image {} as {}: {}", source, target, e),
            })
    }

    async fn push(&self, reference: &str) -> Result<()> {
        let (repository, tag) = split_reference(reference);
        let mut stream = self.docker.push_image(
            repository,
            Some(PushImageOptions { tag }),
            self.docker_credentials(),
        );
        while let Some(progress) = stream.next().await {
            let progress = progress.map_err(|e| MigraptorError::Engine {
                message: format!("Failed to push image {}: {}", reference, e),
            })?;
            if let Some(status) = progress.status {
                debug!("push {}: {}", reference, status);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_debug_redacts_password() {
        let credentials = RegistryCredentials {
            server: "registry.gitlab.com".into(),
            username: "root".into(),
            password: "glpat-secret".into(),
        };
        let printed = format!("{:?}", credentials);
        assert!(printed.contains("registry.gitlab.com"));
        assert!(!printed.contains("glpat-secret"));
    }

    #[test]
    fn test_credentials_map_to_docker_auth() {
        let credentials = RegistryCredentials {
            server: "registry.example.com".into(),
            username: "deploy".into(),
            password: "pw".into(),
        };
        let docker = credentials.to_docker();
        assert_eq!(docker.username.as_deref(), Some("deploy"));
        assert_eq!(docker.serveraddress.as_deref(), Some("registry.example.com"));
    }
}
