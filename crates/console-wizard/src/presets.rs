use std::sync::Arc;

use thiserror::Error;
use wizard_spec::{DefinitionError, WizardDefinition, WizardSpec};

use crate::catalog;

pub struct Preset {
    pub id: &'static str,
    source: &'static str,
}

const PRESETS: &[Preset] = &[
    Preset {
        id: "launch-instance",
        source: include_str!("../wizards/launch-instance.json"),
    },
    Preset {
        id: "create-vpc",
        source: include_str!("../wizards/create-vpc.json"),
    },
    Preset {
        id: "create-cluster",
        source: include_str!("../wizards/create-cluster.json"),
    },
    Preset {
        id: "create-bucket",
        source: include_str!("../wizards/create-bucket.json"),
    },
    Preset {
        id: "create-route-table",
        source: include_str!("../wizards/create-route-table.json"),
    },
    Preset {
        id: "create-security-group",
        source: include_str!("../wizards/create-security-group.json"),
    },
    Preset {
        id: "add-identity-provider",
        source: include_str!("../wizards/add-identity-provider.json"),
    },
];

#[derive(Debug, Error)]
pub enum PresetError {
    #[error("unknown wizard '{0}' (run `console-wizard list` to see the available ones)")]
    Unknown(String),
    #[error("wizard '{id}' is not a valid definition document: {source}")]
    Parse {
        id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("wizard '{id}' failed to build: {source}")]
    Definition {
        id: String,
        #[source]
        source: DefinitionError,
    },
}

pub fn all() -> &'static [Preset] {
    PRESETS
}

pub fn find(id: &str) -> Result<&'static Preset, PresetError> {
    PRESETS
        .iter()
        .find(|preset| preset.id == id)
        .ok_or_else(|| PresetError::Unknown(id.to_string()))
}

impl Preset {
    pub fn spec(&self) -> Result<WizardSpec, PresetError> {
        serde_json::from_str(self.source).map_err(|source| PresetError::Parse {
            id: self.id.to_string(),
            source,
        })
    }

    /// Definition wired to the mock catalogs.
    pub fn definition(&self) -> Result<Arc<WizardDefinition>, PresetError> {
        let builder = WizardDefinition::builder(self.spec()?);
        catalog::register(builder)
            .build()
            .map(Arc::new)
            .map_err(|source| PresetError::Definition {
                id: self.id.to_string(),
                source,
            })
    }
}

pub fn definition(id: &str) -> Result<Arc<WizardDefinition>, PresetError> {
    find(id)?.definition()
}
