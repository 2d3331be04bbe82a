//! Container image build plan
//!
//! Commands are grouped by stage. Whatever order the groups are declared
//! in, the flattened command list runs system packages first, then ML
//! frameworks, then domain libraries, then cleanup/reinstall pairs.

use serde::{Deserialize, Serialize};

/// Base image used when the build section does not name one
pub const DEFAULT_BASE_IMAGE: &str = "mlrun/mlrun-kfp";

const TORCH_INDEX: &str = "https://download.pytorch.org/whl/cpu";
const ONNX_PACKAGE: &str = "onnxruntime";

/// Build stage of a command group, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStage {
    /// OS packages
    System,
    /// ML framework installs
    Framework,
    /// Domain libraries
    Domain,
    /// Uninstall/reinstall pairs for conflicting packages
    Cleanup,
}

/// Commands belonging to one stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandGroup {
    pub stage: BuildStage,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    pub commands: Vec<String>,
}

impl CommandGroup {
    pub fn new(stage: BuildStage, label: &str, commands: Vec<String>) -> Self {
        Self {
            stage,
            label: Some(label.to_string()),
            commands,
        }
    }
}

/// Image build section of a project file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageBuildSpec {
    #[serde(default = "default_base_image")]
    pub base_image: String,

    #[serde(default)]
    pub groups: Vec<CommandGroup>,
}

fn default_base_image() -> String {
    DEFAULT_BASE_IMAGE.to_string()
}

impl Default for ImageBuildSpec {
    fn default() -> Self {
        Self::reference()
    }
}

impl ImageBuildSpec {
    /// The built-in plan: ffmpeg, CPU torch, Hugging Face tooling and the
    /// LangChain/spaCy/Presidio stack used by the call-generation demo.
    pub fn reference() -> Self {
        let system = vec!["apt-get update -y && apt-get install ffmpeg -y".to_string()];

        let infrastructure = vec![
            "pip install transformers==4.44.1".to_string(),
            format!(
                "pip install torch==2.1.2 torchvision==0.16.2 torchaudio==2.1.2 --index-url {}",
                TORCH_INDEX
            ),
        ];

        let huggingface = vec![
            "pip install bitsandbytes==0.41.1 accelerate==0.24.1 datasets==2.14.6 peft==0.5.0 optimum==1.13.2"
                .to_string(),
        ];

        let domain = vec![
            "pip install langchain==0.2.17 openai==1.58.1 langchain_community==0.2.19 pydub==0.25.1 \
             streamlit==1.28.0 st-annotated-text==4.0.1 spacy==3.7.1 librosa==0.10.1 \
             presidio-anonymizer==2.2.34 presidio-analyzer==2.2.34 nltk==3.8.1 flair==0.13.0 htbuilder==0.6.2"
                .to_string(),
            "pip install https://github.com/explosion/spacy-models/releases/download/en_core_web_lg-3.7.1/en_core_web_lg-3.7.1.tar.gz"
                .to_string(),
            "pip install SQLAlchemy==2.0.31 pymysql requests_toolbelt==0.10.1".to_string(),
        ];

        let cleanup = vec![
            "pip uninstall -y onnxruntime-gpu onnxruntime".to_string(),
            format!("pip install {}", ONNX_PACKAGE),
            "pip uninstall -y protobuf".to_string(),
            "pip install protobuf".to_string(),
        ];

        Self {
            base_image: default_base_image(),
            groups: vec![
                CommandGroup::new(BuildStage::System, "system", system),
                CommandGroup::new(BuildStage::Framework, "infrastructure", infrastructure),
                CommandGroup::new(BuildStage::Framework, "huggingface", huggingface),
                CommandGroup::new(BuildStage::Domain, "other", domain),
                CommandGroup::new(BuildStage::Cleanup, "conflicts", cleanup),
            ],
        }
    }

    /// Flattened command list in stage order
    pub fn commands(&self) -> Vec<String> {
        let mut groups: Vec<&CommandGroup> = self.groups.iter().collect();
        // stable: groups of one stage keep their declared order
        groups.sort_by_key(|g| g.stage);
        groups
            .into_iter()
            .flat_map(|g| g.commands.iter().cloned())
            .collect()
    }

    /// Build request for `image`
    pub fn to_request(&self, image: impl Into<String>) -> BuildRequest {
        BuildRequest {
            image: image.into(),
            base_image: self.base_image.clone(),
            commands: self.commands(),
            set_as_default: true,
            overwrite_build_params: true,
        }
    }
}

/// Image name the platform uses for a project without a configured image
pub fn default_project_image(project: &str) -> String {
    format!(".mlrun-project-image-{}", project)
}

/// Payload of a container build request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRequest {
    pub image: String,
    pub base_image: String,
    pub commands: Vec<String>,
    pub set_as_default: bool,
    pub overwrite_build_params: bool,
}
