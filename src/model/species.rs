//! Species (model type) registry
//!
//! The set of species is fixed at compile time. Each anthro species has a
//! [`SpeciesDescriptor`] whose resource names are derived from its id:
//! - geometry: `cottfur:geo/{id}.geo.json`
//! - default texture: `cottfur:textures/entity/{id}.png`
//! - animations: `cottfur:animations/{id}.animation.json`
//!
//! [`ModelType::None`] is the sentinel for the default player model and has no
//! descriptor.

use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Resource namespace for all derived resource names
pub const RESOURCE_NAMESPACE: &str = "cottfur";

/// Available model types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    /// Default player model
    None,
    Protogen,
    K9,
    Feline,
    AnthroBase,
}

impl ModelType {
    /// All model types, sentinel first
    pub const ALL: [ModelType; 5] = [
        ModelType::None,
        ModelType::Protogen,
        ModelType::K9,
        ModelType::Feline,
        ModelType::AnthroBase,
    ];

    /// Identifier used in configs and on the wire
    pub fn id(&self) -> &'static str {
        match self {
            ModelType::None => "none",
            ModelType::Protogen => "protogen",
            ModelType::K9 => "k9",
            ModelType::Feline => "feline",
            ModelType::AnthroBase => "anthro_base",
        }
    }

    /// Human-readable name for selection lists
    pub fn display_name(&self) -> &'static str {
        match self {
            ModelType::None => "None (Default Player)",
            ModelType::Protogen => "Protogen",
            ModelType::K9 => "Canine (K9)",
            ModelType::Feline => "Feline",
            ModelType::AnthroBase => "Basic Anthro",
        }
    }

    /// Look up a model type by id, unknown ids give [`ModelType::None`]
    pub fn from_id(id: &str) -> ModelType {
        Self::ALL
            .into_iter()
            .find(|t| t.id() == id)
            .unwrap_or(ModelType::None)
    }

    /// Whether this is an actual anthro model rather than the sentinel
    pub fn is_anthro_model(&self) -> bool {
        *self != ModelType::None
    }

    /// All anthro model types, in registry order
    pub fn anthro_types() -> impl Iterator<Item = ModelType> {
        Self::ALL.into_iter().filter(ModelType::is_anthro_model)
    }

    /// Descriptor for this type, `None` for the sentinel
    pub fn descriptor(&self) -> Option<&'static SpeciesDescriptor> {
        SPECIES.iter().find(|d| d.model_type == *self)
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Resource names for one species
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpeciesDescriptor {
    pub model_type: ModelType,
    pub id: &'static str,
    pub display_name: &'static str,
    /// Geometry (mesh) resource
    pub model_resource: String,
    /// Default texture, used unless the player set a custom texture
    pub texture_resource: String,
    /// Animation set resource
    pub animation_resource: String,
}

impl SpeciesDescriptor {
    fn derive(model_type: ModelType) -> Self {
        let id = model_type.id();
        Self {
            model_type,
            id,
            display_name: model_type.display_name(),
            model_resource: format!("{}:geo/{}.geo.json", RESOURCE_NAMESPACE, id),
            texture_resource: format!("{}:textures/entity/{}.png", RESOURCE_NAMESPACE, id),
            animation_resource: format!(
                "{}:animations/{}.animation.json",
                RESOURCE_NAMESPACE, id
            ),
        }
    }
}

static SPECIES: Lazy<Vec<SpeciesDescriptor>> =
    Lazy::new(|| ModelType::anthro_types().map(SpeciesDescriptor::derive).collect());

/// Stateless lookup over the known species
pub struct ModelRegistry;

impl ModelRegistry {
    /// Resolve a species id to its descriptor.
    ///
    /// Returns `None` both for "none" and for ids this build does not know.
    pub fn resolve(species_id: &str) -> Option<&'static SpeciesDescriptor> {
        ModelType::from_id(species_id).descriptor()
    }

    /// Every known species, in stable order
    pub fn all_known_species() -> &'static [SpeciesDescriptor] {
        &SPECIES
    }

    /// Whether a species id has a descriptor
    pub fn is_registered(species_id: &str) -> bool {
        Self::resolve(species_id).is_some()
    }
}
