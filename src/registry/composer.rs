//! composer.rs
//! Drives one model (and any donors) through normalize, broadcast, merge and classify.

use super::source::ModelSource;
use crate::analysis::topology::{self, EvaluationPlan};
use crate::classify::DependencyClassifier;
use crate::config::EngineConfig;
use crate::dimension::Broadcaster;
use crate::display::summary::{self, FieldSummary};
use crate::error::{ComposeError, Result};
use crate::merge::{MergeEngine, MergeReport};
use crate::normalize::Normalizer;
use crate::notice::{Notice, NoticeKind};
use crate::store::{Category, Field, FieldBody, FieldPool, ResolvedDependencies};

/// A fully assembled model: every field shaped and every equation classified.
#[derive(Debug, Clone)]
pub struct ComposedModel {
    source: ModelSource,
    pool: FieldPool,
    donors: Vec<String>,
    notices: Vec<Notice>,
    report: MergeReport,
}

impl ComposedModel {
    pub fn name(&self) -> &str { &self.source.name }
    pub fn source(&self) -> &ModelSource { &self.source }
    pub fn pool(&self) -> &FieldPool { &self.pool }
    pub fn into_pool(self) -> FieldPool { self.pool }

    /// Names of the models merged into the base, in merge order.
    pub fn donors(&self) -> &[String] { &self.donors }
    pub fn notices(&self) -> &[Notice] { &self.notices }
    pub fn merge_report(&self) -> &MergeReport { &self.report }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.pool.get(name)
    }

    pub fn dependencies(&self, name: &str) -> Option<&ResolvedDependencies> {
        self.pool.get(name)?.dependencies.as_ref()
    }

    pub fn evaluation_plan(&self) -> Result<EvaluationPlan> {
        topology::evaluation_plan(&self.pool)
    }

    pub fn summaries(&self) -> Vec<FieldSummary> {
        summary::summarize(&self.pool)
    }

    pub fn dependency_tree(&self, target: &str) -> String {
        summary::format_dependency_tree(&self.pool, target)
    }

    /// Writes a preset's values into parameter values and differential initial
    /// conditions. Names the model does not define are skipped with a notice.
    pub fn apply_preset(&mut self, preset: &str) -> Result<Vec<Notice>> {
        let Some(values) = self.source.presets.get(preset).map(|p| p.fields.clone()) else {
            return Err(ComposeError::PresetNotFound {
                model: self.source.name.clone(),
                preset: preset.to_string(),
                available: self.source.presets.keys().cloned().collect(),
            });
        };

        // Check every entry before writing any.
        let mut notices = Vec::new();
        let mut writes = Vec::new();
        for (name, value) in values {
            match self.pool.get(&name).map(Field::category) {
                None => notices.push(unknown_preset_field(preset, &name)),
                Some(Category::Parameter | Category::DifferentialVariable) => writes.push((name, value)),
                Some(category) => {
                    return Err(ComposeError::InvalidAttribute {
                        field: name,
                        key: format!("preset '{}'", preset),
                        reason: format!("a {} takes no preset value", category),
                    });
                }
            }
        }

        for (name, value) in writes {
            if let Some(field) = self.pool.get_mut(&name) {
                if let FieldBody::Parameter { value: slot } | FieldBody::DifferentialVariable { initial: slot, .. } =
                    &mut field.body
                {
                    *slot = Some(value);
                }
            }
        }
        tracing::debug!(model = %self.source.name, preset, "applied preset");
        Ok(notices)
    }
}

fn unknown_preset_field(preset: &str, name: &str) -> Notice {
    Notice::new(
        NoticeKind::UnknownPresetField,
        Some(name),
        format!("Preset '{}' sets '{}', which the model does not define", preset, name),
    )
}

/// The composition pipeline, configured once.
#[derive(Debug, Clone, Default)]
pub struct Composer {
    config: EngineConfig,
}

impl Composer {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Normalizes and shapes a single source, without classifying it.
    pub fn prepare(&self, source: &ModelSource) -> Result<(FieldPool, Vec<Notice>)> {
        let normalized = Normalizer::new(self.config.duplicates).normalize(source.logics.clone())?;
        let mut pool = normalized.pool;
        let mut notices = normalized.notices;
        notices.extend(self.broadcaster(source).broadcast(&mut pool, &source.shapes.declaration)?);
        Ok((pool, notices))
    }

    fn broadcaster(&self, source: &ModelSource) -> Broadcaster {
        Broadcaster::new(source.shapes.dims.clone().unwrap_or_else(|| self.config.dims.clone()))
    }

    pub fn compose(&self, source: ModelSource) -> Result<ComposedModel> {
        self.compose_all(source, [])
    }

    /// Composes `base`, then merges each donor into it in order.
    pub fn compose_all<I>(&self, base: ModelSource, donors: I) -> Result<ComposedModel>
    where
        I: IntoIterator<Item = ModelSource>,
    {
        let (pool, notices) = self.prepare(&base)?;
        let mut model = ComposedModel {
            source: base,
            pool,
            donors: Vec::new(),
            notices,
            report: MergeReport::default(),
        };

        for donor in donors {
            self.merge_pool(&mut model, &donor)?;
        }
        self.finish(&mut model)?;

        for (preset, contents) in &model.source.presets {
            for name in contents.fields.keys().filter(|n| !model.pool.contains(n)) {
                model.notices.push(unknown_preset_field(preset, name));
            }
        }

        tracing::info!(
            model = %model.source.name,
            donors = model.donors.len(),
            fields = model.pool.len(),
            notices = model.notices.len(),
            "composed model"
        );
        Ok(model)
    }

    /// Merges one more donor into an already composed model and re-classifies it.
    pub fn merge(&self, model: &mut ComposedModel, donor: &ModelSource) -> Result<MergeReport> {
        let report = self.merge_pool(model, donor)?;
        self.finish(model)?;
        Ok(report)
    }

    /// A donor is shaped but never padded: names it declares without defining,
    /// and dimensions it spans without defining, are only filled in if the
    /// merged pool still lacks them.
    fn merge_pool(&self, model: &mut ComposedModel, donor: &ModelSource) -> Result<MergeReport> {
        let normalized = Normalizer::new(self.config.duplicates).normalize(donor.logics.clone())?;
        let mut pool = normalized.pool;
        let mut notices = normalized.notices;

        let broadcaster = self.broadcaster(donor);
        let undefined = broadcaster.broadcast_donor(&mut pool, &donor.shapes.declaration)?;

        let report = MergeEngine::new(self.config.merge).merge(&mut model.pool, pool)?;
        notices.extend(broadcaster.synthesize(&mut model.pool, undefined));

        model.notices.extend(notices);
        model.donors.push(donor.name.clone());
        model.report.extend(report.clone());
        Ok(report)
    }

    /// Shapes whatever the merges left unshaped and classifies.
    fn finish(&self, model: &mut ComposedModel) -> Result<()> {
        let notices = self.broadcaster(&model.source).complete(&mut model.pool);
        model.notices.extend(notices);

        let notices = DependencyClassifier::new(self.config.strictness).classify(&mut model.pool)?;
        model.notices.extend(notices);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::RawLogics;
    use crate::registry::source::Preset;
    use crate::store::{Category, Value};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn growth() -> ModelSource {
        let logics = RawLogics::from_json(json!({
            "parameter": { "rate": 0.02 },
            "differential_variable": { "population": { "equation": "population * rate", "initial": 1.0 } }
        }))
        .unwrap();
        let preset = Preset {
            fields: BTreeMap::from([
                ("rate".to_string(), Value::Scalar(0.05)),
                ("population".to_string(), Value::Scalar(10.0)),
                ("ghost".to_string(), Value::Scalar(0.0)),
            ]),
            ..Default::default()
        };
        ModelSource::new("Growth", logics).with_preset("fast", preset)
    }

    #[test]
    fn test_compose_single_model() {
        let model = Composer::default().compose(growth()).unwrap();
        let deps = model.dependencies("population").unwrap();
        assert!(deps.parameter_names.contains("rate"));
        assert!(deps.state_names.contains("population"));
        assert!(model.pool().fields().all(|f| f.shape.is_some()));
        assert!(model.notices().iter().any(|n| n.kind == NoticeKind::UnknownPresetField));
    }

    #[test]
    fn test_apply_preset() {
        let mut model = Composer::default().compose(growth()).unwrap();
        let notices = model.apply_preset("fast").unwrap();
        assert_eq!(notices.len(), 1);
        assert_eq!(
            model.field("rate").unwrap().body,
            FieldBody::Parameter { value: Some(Value::Scalar(0.05)) }
        );
        match &model.field("population").unwrap().body {
            FieldBody::DifferentialVariable { initial, .. } => assert_eq!(initial, &Some(Value::Scalar(10.0))),
            other => panic!("Unexpected body: {:?}", other),
        }

        let err = model.apply_preset("slow").unwrap_err();
        assert!(matches!(err, ComposeError::PresetNotFound { ref available, .. } if available == &["fast"]));
    }

    #[test]
    fn test_rejected_preset_changes_nothing() {
        let logics = RawLogics::from_json(json!({
            "parameter": { "a": 1.0 },
            "state_variable": { "z": "a * 2" }
        }))
        .unwrap();
        let preset = Preset {
            fields: BTreeMap::from([("a".to_string(), Value::Scalar(9.0)), ("z".to_string(), Value::Scalar(5.0))]),
            ..Default::default()
        };
        let mut model = Composer::default().compose(ModelSource::new("Toy", logics).with_preset("bad", preset)).unwrap();

        let err = model.apply_preset("bad").unwrap_err();
        assert!(matches!(err, ComposeError::InvalidAttribute { ref field, .. } if field == "z"));
        assert_eq!(model.field("a").unwrap().body, FieldBody::Parameter { value: Some(Value::Scalar(1.0)) });
    }

    #[test]
    fn test_merge_reclassifies() {
        let composer = Composer::default();
        let mut model = composer.compose(growth()).unwrap();
        let donor = ModelSource::new(
            "Births",
            RawLogics::from_json(json!({ "state_variable": { "births": "population * rate" } })).unwrap(),
        );

        let report = composer.merge(&mut model, &donor).unwrap();
        assert!(report.is_clean());
        assert_eq!(model.donors(), ["Births"]);
        assert_eq!(model.pool().category_of("births"), Some(Category::StateVariable));
        assert!(model.dependencies("births").unwrap().state_names.contains("population"));
    }
}
