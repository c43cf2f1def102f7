//! Suitability Engine
//!
//! Orchestrates one model through its lifecycle:
//!
//! ```text
//! Unfitted → Preprocessed → DensitiesFitted → Scored → Evaluated
//! ```
//!
//! Calling `preprocess` again (directly or through `fit`/`run`) discards every
//! later stage, so a refit never mixes old and new state. Once densities exist
//! the fitted scorer is shared behind an `Arc` and can be handed to any number
//! of readers.

use crate::config::SuitabilityConfig;
use crate::data::{FeatureTable, Label, LabeledSample, PointId};
use crate::density::DensityPair;
use crate::error::{SuitabilityError, SuitabilityResult};
use crate::evaluation::{self, EvaluationResult, ScoredSample};
use crate::preprocess::FeatureTransform;
use crate::projector::{CancellationToken, PredictionProjector, ScoredGrid, SuitabilityScore};
use crate::scorer::SuitabilityScorer;
use crate::utils::normalization::Normalizer;
use rayon::prelude::*;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Lifecycle stage; later stages compare greater
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum EngineStage {
    Unfitted,
    Preprocessed,
    DensitiesFitted,
    Scored,
    Evaluated,
}

impl fmt::Display for EngineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineStage::Unfitted => "unfitted",
            EngineStage::Preprocessed => "preprocessed",
            EngineStage::DensitiesFitted => "densities fitted",
            EngineStage::Scored => "scored",
            EngineStage::Evaluated => "evaluated",
        };
        f.write_str(name)
    }
}

pub struct SuitabilityEngine {
    config: SuitabilityConfig,
    stage: EngineStage,
    presence: Option<FeatureTable>,
    background: Option<FeatureTable>,
    transform: Option<FeatureTransform>,
    scorer: Option<Arc<SuitabilityScorer>>,
    training_scores: Option<Vec<ScoredSample>>,
    /// Fitted on training raw ratios; used for single-point predictions
    reference: Option<Normalizer>,
    evaluation: Option<EvaluationResult>,
}

impl SuitabilityEngine {
    pub fn new(config: SuitabilityConfig) -> SuitabilityResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            stage: EngineStage::Unfitted,
            presence: None,
            background: None,
            transform: None,
            scorer: None,
            training_scores: None,
            reference: None,
            evaluation: None,
        })
    }

    pub fn config(&self) -> &SuitabilityConfig {
        &self.config
    }

    pub fn stage(&self) -> EngineStage {
        self.stage
    }

    pub fn transform(&self) -> Option<&FeatureTransform> {
        self.transform.as_ref()
    }

    /// Shared handle to the fitted scorer
    pub fn scorer(&self) -> Option<Arc<SuitabilityScorer>> {
        self.scorer.clone()
    }

    pub fn training_scores(&self) -> Option<&[ScoredSample]> {
        self.training_scores.as_deref()
    }

    pub fn reference_normalizer(&self) -> Option<&Normalizer> {
        self.reference.as_ref()
    }

    pub fn evaluation(&self) -> Option<&EvaluationResult> {
        self.evaluation.as_ref()
    }

    /// Validate the training tables and fit the feature transform on their union
    ///
    /// Any previous fit is discarded first, even if this call fails.
    pub fn preprocess(
        &mut self,
        presence: FeatureTable,
        background: FeatureTable,
    ) -> SuitabilityResult<()> {
        self.reset();

        let transform =
            FeatureTransform::fit_tables(&presence, &background, self.config.scaling)?;
        info!(
            "Preprocessed {} presence and {} background points over {} covariates",
            presence.len(),
            background.len(),
            transform.dim()
        );

        self.transform = Some(transform);
        self.presence = Some(presence);
        self.background = Some(background);
        self.stage = EngineStage::Preprocessed;
        Ok(())
    }

    /// Fit both class densities in the preprocessed space
    ///
    /// Runs only from `Preprocessed`; refitting goes back through `preprocess`.
    pub fn fit_densities(&mut self) -> SuitabilityResult<()> {
        self.require(EngineStage::Preprocessed, "preprocess the training tables first")?;
        if self.stage > EngineStage::Preprocessed {
            return Err(SuitabilityError::InvalidStage {
                operation: "fit densities",
                stage: self.stage,
            });
        }
        let (Some(transform), Some(presence), Some(background)) =
            (&self.transform, &self.presence, &self.background)
        else {
            return Err(SuitabilityError::ModelNotFitted("training tables missing"));
        };

        let started = Instant::now();
        let densities = DensityPair::fit(
            &transform.apply_table(presence)?,
            &transform.apply_table(background)?,
            &self.config,
        )?;
        let scorer = SuitabilityScorer::new(
            transform.clone(),
            densities,
            self.config.epsilon,
            self.config.normalization_mode,
        )?;
        info!(
            "Fitted densities in {:.2}s (presence h = {:?}, background h = {:?})",
            started.elapsed().as_secs_f64(),
            scorer.densities().presence.bandwidths(),
            scorer.densities().background.bandwidths()
        );

        self.scorer = Some(Arc::new(scorer));
        self.stage = EngineStage::DensitiesFitted;
        Ok(())
    }

    /// `preprocess` followed by `fit_densities`
    pub fn fit(&mut self, presence: FeatureTable, background: FeatureTable) -> SuitabilityResult<()> {
        self.preprocess(presence, background)?;
        self.fit_densities()
    }

    /// Raw ratios of every training point, presence first
    ///
    /// Once scored, later calls return the stored scores and keep the stage.
    pub fn score_training(&mut self) -> SuitabilityResult<Vec<ScoredSample>> {
        let scorer = self.fitted_scorer()?;
        if let Some(samples) = &self.training_scores {
            return Ok(samples.clone());
        }
        let (Some(presence), Some(background)) = (&self.presence, &self.background) else {
            return Err(SuitabilityError::ModelNotFitted("training tables missing"));
        };

        let labeled: Vec<LabeledSample> = presence
            .labeled(Label::Presence)
            .into_iter()
            .chain(background.labeled(Label::Background))
            .collect();
        let samples = labeled
            .par_iter()
            .map(|s| {
                scorer
                    .score(&s.features)
                    .map(|raw| ScoredSample::new(raw, s.label))
            })
            .collect::<SuitabilityResult<Vec<_>>>()?;

        let raws: Vec<f64> = samples.iter().map(|s| s.score).collect();
        self.reference = Some(scorer.normalizer(&raws));
        self.training_scores = Some(samples.clone());
        self.stage = EngineStage::Scored;
        info!("Scored {} training points", samples.len());
        Ok(samples)
    }

    /// AUC of the training scores
    ///
    /// Once evaluated, later calls return the stored result.
    pub fn evaluate(&mut self) -> SuitabilityResult<EvaluationResult> {
        self.require(EngineStage::Scored, "score the training points first")?;
        if let Some(result) = &self.evaluation {
            return Ok(result.clone());
        }
        let samples = self
            .training_scores
            .as_deref()
            .ok_or(SuitabilityError::ModelNotFitted("training scores missing"))?;

        let result = evaluation::evaluate(samples, self.config.include_roc)?;
        info!("Evaluated: {}", result.log_line());

        self.evaluation = Some(result.clone());
        self.stage = EngineStage::Evaluated;
        Ok(result)
    }

    /// Fit, score and evaluate in one go
    pub fn run(
        &mut self,
        presence: FeatureTable,
        background: FeatureTable,
    ) -> SuitabilityResult<EvaluationResult> {
        self.fit(presence, background)?;
        self.score_training()?;
        self.evaluate()
    }

    /// Score one raw feature vector
    ///
    /// `normalized` uses the normalizer fitted on training ratios once
    /// `score_training` has run, and equals `raw` before that. It is not
    /// comparable with [`ScoredGrid`] values, which are normalized against the
    /// grid's own ratios.
    pub fn predict(
        &self,
        point_id: impl Into<PointId>,
        features: &[f64],
    ) -> SuitabilityResult<SuitabilityScore> {
        let scorer = self.fitted_scorer()?;
        let raw = scorer.score(features)?;
        let normalized = self.reference.as_ref().map_or(raw, |n| n.apply(raw));
        Ok(SuitabilityScore {
            point_id: point_id.into(),
            raw,
            normalized,
        })
    }

    /// Project the fitted model onto a grid table
    pub fn project(
        &self,
        grid: &FeatureTable,
        token: &CancellationToken,
    ) -> SuitabilityResult<ScoredGrid> {
        let scorer = self.fitted_scorer()?;
        PredictionProjector::from_config(&scorer, &self.config).project(grid, token)
    }

    fn fitted_scorer(&self) -> SuitabilityResult<Arc<SuitabilityScorer>> {
        self.require(EngineStage::DensitiesFitted, "fit both densities first")?;
        self.scorer
            .clone()
            .ok_or(SuitabilityError::ModelNotFitted("fit both densities first"))
    }

    fn require(&self, needed: EngineStage, hint: &'static str) -> SuitabilityResult<()> {
        if self.stage < needed {
            return Err(SuitabilityError::ModelNotFitted(hint));
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.stage = EngineStage::Unfitted;
        self.presence = None;
        self.background = None;
        self.transform = None;
        self.scorer = None;
        self.training_scores = None;
        self.reference = None;
        self.evaluation = None;
    }
}
