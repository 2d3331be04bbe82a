//! Setup engine - runs the project setup sequence against a platform

use crate::{
    core::{
        image::default_project_image,
        FunctionConfig, FunctionDescriptor, FunctionSource, PipelineDefinition, Project,
        ProjectConfig, SecretSet, SetupState, WorkflowSpec,
    },
    platform::Platform,
    setup::{
        resolve::{resolve_image, resolve_options, resolve_with_repo},
        SetupError,
    },
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Events that can occur during a setup run
#[derive(Debug, Clone)]
pub enum SetupEvent {
    SetupStarted {
        run_id: Uuid,
        project: String,
    },
    SourceSet {
        url: String,
    },
    DefaultImageSet {
        image: String,
    },
    ImageBuildStarted {
        image: String,
        base_image: String,
        commands: Vec<String>,
    },
    ImageBuilt {
        image: String,
    },
    SecretsStored {
        keys: Vec<String>,
    },
    FunctionRegistered {
        name: String,
        url: String,
        with_repo: bool,
        image: Option<String>,
    },
    WorkflowAttached {
        name: String,
        path: String,
    },
    ProjectSaved {
        project: String,
        path: Option<PathBuf>,
    },
    SetupFailed {
        error: String,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(&SetupEvent) + Send + Sync>;

type SecretLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Runs project setup
pub struct SetupEngine<P> {
    platform: P,
    context_dir: PathBuf,
    write_descriptor: bool,
    secret_lookup: SecretLookup,
    event_handlers: Vec<EventHandler>,
}

impl<P: Platform> SetupEngine<P> {
    /// Create an engine whose workflow paths and `project.yaml` live in `context_dir`
    pub fn new(platform: P, context_dir: impl Into<PathBuf>) -> Self {
        Self {
            platform,
            context_dir: context_dir.into(),
            write_descriptor: true,
            secret_lookup: Box::new(|key| std::env::var(key).ok()),
            event_handlers: Vec::new(),
        }
    }

    /// Read secrets through `lookup` instead of the process environment
    pub fn with_secret_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.secret_lookup = Box::new(lookup);
        self
    }

    /// Whether to write `project.yaml` into the context directory
    pub fn with_descriptor_file(mut self, write: bool) -> Self {
        self.write_descriptor = write;
        self
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(&SetupEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
    }

    fn emit(&self, event: SetupEvent) {
        for handler in &self.event_handlers {
            handler(&event);
        }
    }

    /// Run the whole setup sequence.
    ///
    /// `state` is updated as the run progresses and left terminal on return.
    pub async fn run(&self, config: &ProjectConfig, state: &mut SetupState) -> Result<Project, SetupError> {
        info!("Starting setup of project {} ({})", config.name, state.run_id);
        state.start();
        self.emit(SetupEvent::SetupStarted {
            run_id: state.run_id,
            project: config.name.clone(),
        });

        let result = self.run_steps(config, state).await;

        match &result {
            Ok(_) => {
                state.complete();
                info!("Project {} set up", config.name);
            }
            Err(e) => {
                error!("Setup of project {} failed: {}", config.name, e);
                state.fail(e.to_string());
                self.emit(SetupEvent::SetupFailed { error: e.to_string() });
            }
        }

        result
    }

    async fn run_steps(&self, config: &ProjectConfig, state: &mut SetupState) -> Result<Project, SetupError> {
        let options = resolve_options(&config.params)?;

        // Credentials are checked before anything reaches the platform.
        let secrets = SecretSet::from_lookup(&config.secrets, |key| (self.secret_lookup)(key))?;

        let mut project = Project::from_config(config);

        if let Some(url) = &options.source.value {
            info!("Project source: {}", url);
            project.set_source(url.clone(), false);
            self.emit(SetupEvent::SourceSet { url: url.clone() });
        }

        if let Some(image) = &options.default_image.value {
            info!("Default image: {}", image);
            project.set_default_image(image.clone());
            self.emit(SetupEvent::DefaultImageSet { image: image.clone() });
        }

        if options.build_image.value {
            self.build_image(config, &mut project, state).await?;
        }

        self.platform.store_secrets(&project.name, &secrets).await?;
        project.secret_keys = secrets.keys().map(str::to_string).collect();
        state.secrets_stored = true;
        self.emit(SetupEvent::SecretsStored {
            keys: project.secret_keys.clone(),
        });

        for function_config in &config.functions {
            let function = self.describe_function(function_config, &project);
            self.platform.store_function(&project.name, &function).await?;
            self.emit(SetupEvent::FunctionRegistered {
                name: function.name.clone(),
                url: function.source.url(),
                with_repo: function.with_repo,
                image: function.image.clone(),
            });
            project.set_function(function);
            state.functions_registered += 1;
        }

        for workflow_config in &config.workflows {
            let path = self.context_dir.join(&workflow_config.path);
            let definition =
                PipelineDefinition::from_file(&path).map_err(|source| SetupError::WorkflowLoad {
                    workflow: workflow_config.name.clone(),
                    path: path.display().to_string(),
                    source,
                })?;

            let mut workflow = WorkflowSpec::from_config(workflow_config, definition);
            workflow.image = resolve_image(workflow.image.as_deref(), project.default_image.as_deref()).value;
            project.set_workflow(workflow)?;
            state.workflows_attached += 1;
            self.emit(SetupEvent::WorkflowAttached {
                name: workflow_config.name.clone(),
                path: workflow_config.path.clone(),
            });
        }

        self.platform.store_project(&project.to_descriptor()).await?;
        let path = if self.write_descriptor {
            Some(project.save_to(&self.context_dir)?)
        } else {
            None
        };
        self.emit(SetupEvent::ProjectSaved {
            project: project.name.clone(),
            path,
        });

        Ok(project)
    }

    async fn build_image(
        &self,
        config: &ProjectConfig,
        project: &mut Project,
        state: &mut SetupState,
    ) -> Result<(), SetupError> {
        let image = project
            .default_image
            .clone()
            .unwrap_or_else(|| default_project_image(&project.name));
        let request = config.build_spec().to_request(image);

        info!("Building image {} from {}", request.image, request.base_image);
        self.emit(SetupEvent::ImageBuildStarted {
            image: request.image.clone(),
            base_image: request.base_image.clone(),
            commands: request.commands.clone(),
        });

        let outcome = self.platform.build_image(&project.name, &request).await?;
        if !outcome.ready {
            return Err(SetupError::ImageBuildFailed {
                image: outcome.image,
                log: outcome.log,
            });
        }

        project.apply_build(&request);
        state.image_built = true;
        self.emit(SetupEvent::ImageBuilt { image: outcome.image });
        Ok(())
    }

    fn describe_function(&self, config: &FunctionConfig, project: &Project) -> FunctionDescriptor {
        let source = FunctionSource::parse(&config.func);
        let with_repo = resolve_with_repo(config.with_repo, &source);
        let image = resolve_image(config.image.as_deref(), project.default_image.as_deref());
        debug!(
            "Function {}: with_repo = {} ({}), image = {:?} ({})",
            config.name, with_repo.value, with_repo.rule, image.value, image.rule
        );

        FunctionDescriptor {
            name: config.name.clone(),
            source,
            kind: config.kind,
            image: image.value,
            handler: config.handler.clone(),
            with_repo: with_repo.value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SetupStatus;
    use crate::platform::DryRunPlatform;
    use std::sync::Mutex;

    fn secrets(key: &str) -> Option<String> {
        Some(format!("value-of-{}", key))
    }

    #[tokio::test]
    async fn test_event_sequence() {
        let config = ProjectConfig::from_yaml(
            r#"
name: calls
params:
  source: git://example.com/calls.git
  build_image: true
functions:
  - name: generator
    func: hub://structured_data_generator
"#,
        )
        .unwrap();
        let dir = tempfile::tempdir().unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorded = seen.clone();
        let mut engine = SetupEngine::new(DryRunPlatform::new(), dir.path()).with_secret_lookup(secrets);
        engine.add_event_handler(move |event| {
            let name = format!("{:?}", event);
            let name = name.split([' ', '{']).next().unwrap_or_default().to_string();
            recorded.lock().unwrap().push(name);
        });

        let mut state = SetupState::new();
        engine.run(&config, &mut state).await.unwrap();

        assert_eq!(state.status, SetupStatus::Completed);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                "SetupStarted",
                "SourceSet",
                "ImageBuildStarted",
                "ImageBuilt",
                "SecretsStored",
                "FunctionRegistered",
                "ProjectSaved",
            ]
        );
    }

    #[tokio::test]
    async fn test_descriptor_file_can_be_skipped() {
        let config = ProjectConfig::from_yaml("name: calls\n").unwrap();
        let dir = tempfile::tempdir().unwrap();
        let engine = SetupEngine::new(DryRunPlatform::new(), dir.path())
            .with_secret_lookup(secrets)
            .with_descriptor_file(false);

        let mut state = SetupState::new();
        let project = engine.run(&config, &mut state).await.unwrap();

        assert_eq!(project.secret_keys, vec!["OPENAI_API_BASE", "OPENAI_API_KEY"]);
        assert!(!dir.path().join("project.yaml").exists());
    }
}
