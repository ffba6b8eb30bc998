//! Reviewer model value objects

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Completion model used for expand and review calls (Value Object)
///
/// Known models get a named variant; anything else round-trips through
/// [`Model::Custom`] so deployments can point at any compatible endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Model {
    Gpt41,
    Gpt41Mini,
    Gpt4o,
    Gpt4oMini,
    ClaudeSonnet45,
    ClaudeHaiku45,
    Custom(String),
}

impl Model {
    /// Get the string identifier for this model
    pub fn as_str(&self) -> &str {
        match self {
            Model::Gpt41 => "gpt-4.1",
            Model::Gpt41Mini => "gpt-4.1-mini",
            Model::Gpt4o => "gpt-4o",
            Model::Gpt4oMini => "gpt-4o-mini",
            Model::ClaudeSonnet45 => "claude-sonnet-4.5",
            Model::ClaudeHaiku45 => "claude-haiku-4.5",
            Model::Custom(s) => s,
        }
    }
}

impl Default for Model {
    fn default() -> Self {
        Model::Gpt4oMini
    }
}

impl std::fmt::Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Model {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "gpt-4.1" => Model::Gpt41,
            "gpt-4.1-mini" => Model::Gpt41Mini,
            "gpt-4o" => Model::Gpt4o,
            "gpt-4o-mini" => Model::Gpt4oMini,
            "claude-sonnet-4.5" => Model::ClaudeSonnet45,
            "claude-haiku-4.5" => Model::ClaudeHaiku45,
            other => Model::Custom(other.to_string()),
        })
    }
}

impl Serialize for Model {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Model {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.parse::<Model>() {
            Ok(model) => Ok(model),
            Err(never) => match never {},
        }
    }
}

/// Sampling parameters stamped onto every run and every review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    pub model: Model,
    pub temperature: f64,
}

impl ModelParams {
    pub fn new(model: Model, temperature: f64) -> Self {
        Self {
            model,
            temperature: temperature.clamp(0.0, 2.0),
        }
    }
}

impl Default for ModelParams {
    fn default() -> Self {
        Self::new(Model::default(), 0.2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_roundtrip() {
        for model in [Model::Gpt41, Model::Gpt4oMini, Model::ClaudeSonnet45] {
            let parsed: Model = model.to_string().parse().unwrap();
            assert_eq!(model, parsed);
        }
    }

    #[test]
    fn test_custom_model() {
        let model: Model = "local-llama-3".parse().unwrap();
        assert_eq!(model, Model::Custom("local-llama-3".to_string()));
        assert_eq!(model.to_string(), "local-llama-3");
    }

    #[test]
    fn test_model_serde_as_string() {
        let params = ModelParams::new(Model::Gpt41, 0.7);
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["model"], "gpt-4.1");
        let back: ModelParams = serde_json::from_value(json).unwrap();
        assert_eq!(back, params);
    }

    #[test]
    fn test_temperature_clamped() {
        assert_eq!(ModelParams::new(Model::Gpt41, 5.0).temperature, 2.0);
        assert_eq!(ModelParams::new(Model::Gpt41, -1.0).temperature, 0.0);
    }
}
