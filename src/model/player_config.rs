//! Player model configuration record

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::model::pattern::PatternType;
use crate::model::species::ModelType;
use crate::wire_record;

/// Default primary (body/fur) color
pub const DEFAULT_PRIMARY_COLOR: u32 = 0xFFFFFF;
/// Default secondary (marking) color
pub const DEFAULT_SECONDARY_COLOR: u32 = 0x888888;
/// Default accent (highlight) color
pub const DEFAULT_ACCENT_COLOR: u32 = 0xFF0000;

/// Longest accepted species, texture or pattern id in bytes
pub const MAX_CONFIG_STRING_LENGTH: usize = 256;

/// One player's avatar choice.
///
/// Colors are packed `0xRRGGBB` values. The species id is kept as sent so that
/// ids unknown to this build survive a round trip; [`PlayerModelConfig::model_type`]
/// resolves it, falling back to [`ModelType::None`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerModelConfig {
    /// Species id, e.g. "protogen", "k9" or "none"
    pub model_type_id: String,
    /// Handle of a user-imported texture
    pub custom_texture_id: Option<String>,
    pub primary_color: u32,
    pub secondary_color: u32,
    pub accent_color: u32,
    /// Pattern selector, e.g. "stripes"
    pub pattern_id: Option<String>,
}

wire_record!(PlayerModelConfig {
    model_type_id,
    custom_texture_id,
    primary_color,
    secondary_color,
    accent_color,
    pattern_id,
});

impl PlayerModelConfig {
    /// Upper bound of the encoded size of a config whose ids are all within
    /// [`MAX_CONFIG_STRING_LENGTH`]: three strings with a 2-byte var-int
    /// length, two option flags and three colors.
    pub const MAX_ENCODED_LEN: usize = 3 * (2 + MAX_CONFIG_STRING_LENGTH) + 2 + 3 * 4;

    /// Create a config for the given species with default colors
    pub fn new(model_type_id: impl Into<String>) -> Self {
        Self {
            model_type_id: model_type_id.into(),
            ..Self::default()
        }
    }

    pub fn with_custom_texture(mut self, texture_id: impl Into<String>) -> Self {
        self.custom_texture_id = Some(texture_id.into());
        self
    }

    pub fn with_colors(mut self, primary: u32, secondary: u32, accent: u32) -> Self {
        self.primary_color = primary;
        self.secondary_color = secondary;
        self.accent_color = accent;
        self
    }

    pub fn with_primary_color(mut self, color: u32) -> Self {
        self.primary_color = color;
        self
    }

    pub fn with_pattern(mut self, pattern_id: impl Into<String>) -> Self {
        self.pattern_id = Some(pattern_id.into());
        self
    }

    /// Resolve the species id, unknown ids map to [`ModelType::None`]
    pub fn model_type(&self) -> ModelType {
        ModelType::from_id(&self.model_type_id)
    }

    /// Resolve the pattern id, absent or unknown ids map to [`PatternType::None`]
    pub fn pattern_type(&self) -> PatternType {
        self.pattern_id
            .as_deref()
            .map(PatternType::from_id)
            .unwrap_or(PatternType::None)
    }

    /// Check every id against [`MAX_CONFIG_STRING_LENGTH`]
    pub fn validate(&self) -> Result<(), ProtocolError> {
        let fields = [
            ("model_type_id", Some(self.model_type_id.as_str())),
            ("custom_texture_id", self.custom_texture_id.as_deref()),
            ("pattern_id", self.pattern_id.as_deref()),
        ];

        for (field, value) in fields {
            if let Some(value) = value {
                if value.len() > MAX_CONFIG_STRING_LENGTH {
                    return Err(ProtocolError::ConfigFieldTooLong {
                        field,
                        length: value.len(),
                        max: MAX_CONFIG_STRING_LENGTH,
                    });
                }
            }
        }
        Ok(())
    }

    /// Whether this config selects an actual anthro model
    pub fn is_anthro_model(&self) -> bool {
        self.model_type().is_anthro_model()
    }
}

impl Default for PlayerModelConfig {
    fn default() -> Self {
        Self {
            model_type_id: ModelType::None.id().to_string(),
            custom_texture_id: None,
            primary_color: DEFAULT_PRIMARY_COLOR,
            secondary_color: DEFAULT_SECONDARY_COLOR,
            accent_color: DEFAULT_ACCENT_COLOR,
            pattern_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::codec::WireCodec;

    #[test]
    fn test_default_config() {
        let config = PlayerModelConfig::default();
        assert_eq!(config.model_type_id, "none");
        assert_eq!(config.custom_texture_id, None);
        assert_eq!(config.primary_color, 0xFFFFFF);
        assert_eq!(config.secondary_color, 0x888888);
        assert_eq!(config.accent_color, 0xFF0000);
        assert_eq!(config.pattern_id, None);
        assert!(!config.is_anthro_model());
    }

    #[test]
    fn test_builder() {
        let config = PlayerModelConfig::new("k9")
            .with_primary_color(0x224466)
            .with_pattern("husky");

        assert_eq!(config.model_type(), ModelType::K9);
        assert_eq!(config.primary_color, 0x224466);
        assert_eq!(config.secondary_color, DEFAULT_SECONDARY_COLOR);
        assert_eq!(config.pattern_type(), PatternType::Husky);
        assert!(config.is_anthro_model());
    }

    #[test]
    fn test_unknown_species_resolves_to_none() {
        let config = PlayerModelConfig::new("dragon");
        assert_eq!(config.model_type(), ModelType::None);
        assert_eq!(config.model_type_id, "dragon");
    }

    #[test]
    fn test_wire_layout() {
        let config = PlayerModelConfig::new("k9")
            .with_colors(0x010203, 0x040506, 0x070809)
            .with_pattern("spots");

        let bytes = config.to_bytes();
        let expected: Vec<u8> = [
            &[0x02, b'k', b'9'][..],
            &[0x00],
            &[0x00, 0x01, 0x02, 0x03],
            &[0x00, 0x04, 0x05, 0x06],
            &[0x00, 0x07, 0x08, 0x09],
            &[0x01, 0x05, b's', b'p', b'o', b't', b's'],
        ]
        .concat();
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_validate_bounds_each_id() {
        let at_limit = PlayerModelConfig::new("k".repeat(MAX_CONFIG_STRING_LENGTH))
            .with_custom_texture("t".repeat(MAX_CONFIG_STRING_LENGTH))
            .with_pattern("p".repeat(MAX_CONFIG_STRING_LENGTH));
        assert!(at_limit.validate().is_ok());
        assert!(at_limit.to_bytes().len() <= PlayerModelConfig::MAX_ENCODED_LEN);
        assert_eq!(
            PlayerModelConfig::from_bytes(&at_limit.to_bytes()).unwrap(),
            at_limit
        );

        let texture = PlayerModelConfig::new("k9").with_custom_texture("a".repeat(40_000));
        assert!(matches!(
            texture.validate(),
            Err(ProtocolError::ConfigFieldTooLong {
                field: "custom_texture_id",
                length: 40_000,
                max: MAX_CONFIG_STRING_LENGTH,
            })
        ));

        let pattern = PlayerModelConfig::new("k9").with_pattern("s".repeat(257));
        assert!(pattern.validate().is_err());
        let species = PlayerModelConfig::new("x".repeat(257));
        assert!(species.validate().is_err());
    }

    #[test]
    fn test_round_trip_with_and_without_optionals() {
        let bare = PlayerModelConfig::new("feline");
        let full = PlayerModelConfig::new("protogen")
            .with_custom_texture("cottfur:custom/abc123")
            .with_colors(0x112233, 0x445566, 0x778899)
            .with_pattern("two_tone");

        for config in [bare, full] {
            let decoded = PlayerModelConfig::from_bytes(&config.to_bytes()).unwrap();
            assert_eq!(decoded, config);
        }
    }
}
