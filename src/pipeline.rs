//! The daily pipeline and the multi-day runner.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate};
use chrono_tz::Tz;
use feedtally_core::aggregate::{aggregate_day, aggregate_partners};
use feedtally_core::config::{Config, ConfigError};
use feedtally_core::extract::{RuleError, RuleTable};
use feedtally_core::normalizer::normalize;
use feedtally_core::{CounterSet, DailyTotalsRow, PartnerDirectory};
use feedtally_store::{
    discover, BatchFetcher, FetchError, FetchSettings, PartnerSource, PublishError,
    PublishSettings, Publisher, StoreClient, StoreError, Table,
};
use thiserror::Error;
use tracing::Instrument;

use crate::dates::now_in;
use crate::report::{DayOutcome, DayReport, DaySummary};

/// Everything the pipeline needs, resolved from [`Config`].
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub folder: String,
    pub fetch: FetchSettings,
    pub publish: PublishSettings,
    pub only_active_partners: bool,
    pub publish_totals: bool,
    pub publish_partners: bool,
    pub timezone: Tz,
    pub pause_between_days: Duration,
}

impl PipelineSettings {
    pub fn from_config(cfg: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            folder: cfg.store.folder.clone(),
            fetch: FetchSettings::from_config(&cfg.store, &cfg.fetch),
            publish: PublishSettings::from_config(&cfg.store, &cfg.publish),
            only_active_partners: cfg.run.only_active_partners,
            publish_totals: cfg.run.publish_totals,
            publish_partners: cfg.run.publish_partners,
            timezone: cfg.run.tz()?,
            pause_between_days: Duration::from_secs(1),
        })
    }
}

/// Per-run switches.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Wipe the day's rows before writing.
    pub clear_first: bool,
    /// Extract and aggregate, but do not publish.
    pub preview: bool,
    /// Stamp for published rows; defaults to now in the configured timezone.
    pub updated_at: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid extraction rule: {0}")]
    Rules(#[from] RuleError),
    #[error("could not create store client: {0}")]
    Client(#[source] StoreError),
    #[error("listing artifacts for {date} failed: {source}")]
    Listing {
        date: NaiveDate,
        #[source]
        source: StoreError,
    },
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Publish(#[from] PublishError),
}

pub struct Pipeline {
    client: StoreClient,
    partners: Arc<dyn PartnerSource>,
    rules: RuleTable,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        client: StoreClient,
        partners: Arc<dyn PartnerSource>,
        rules: RuleTable,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            client,
            partners,
            rules,
            settings,
        }
    }

    /// Validate `cfg` and build a pipeline talking to the configured store.
    pub fn from_config(cfg: &Config) -> Result<Self, PipelineError> {
        cfg.validate()?;
        let client = StoreClient::from_config(&cfg.store).map_err(PipelineError::Client)?;
        let rules = RuleTable::with_rules(&cfg.extraction.rules)?;
        let settings = PipelineSettings::from_config(cfg)?;
        Ok(Self::new(client.clone(), Arc::new(client), rules, settings))
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run the whole pipeline for one day.
    ///
    /// Returns [`DayOutcome::Skipped`] when the store lists nothing for the
    /// day. Listing failures, an unreachable store and a failed clearing
    /// chunk are errors; everything else is recorded in the report.
    pub async fn run_day(&self, date: NaiveDate, opts: &RunOptions) -> Result<DayReport, PipelineError> {
        self.run_day_inner(date, opts)
            .instrument(tracing::info_span!("day", %date))
            .await
    }

    async fn run_day_inner(&self, date: NaiveDate, opts: &RunOptions) -> Result<DayReport, PipelineError> {
        let artifacts = discover(&self.client, &self.settings.folder, date)
            .await
            .map_err(|source| PipelineError::Listing { date, source })?;
        if artifacts.is_empty() {
            tracing::info!("no artifacts listed; skipping day");
            return Ok(DayReport::skipped(date));
        }

        let names: Vec<String> = artifacts.into_iter().map(|a| a.name).collect();
        let fetched = BatchFetcher::new(&self.client, &self.settings.fetch)
            .fetch(date, &names)
            .await?;

        let per_file: BTreeMap<String, CounterSet> = fetched
            .texts
            .into_iter()
            .map(|(name, text)| {
                let counters = self.rules.extract(&normalize(&text));
                (name, counters)
            })
            .collect();

        let aggregate = aggregate_day(date, &per_file);
        let directory = match self
            .partners
            .partner_directory(self.settings.only_active_partners)
            .await
        {
            Ok(directory) => directory,
            Err(e) => {
                tracing::warn!(error = %e, "partner directory unavailable; using placeholder names");
                PartnerDirectory::default()
            }
        };
        let updated_at = opts
            .updated_at
            .unwrap_or_else(|| now_in(self.settings.timezone));
        let partners = aggregate_partners(date, &per_file, &directory, updated_at);

        let mut published = Vec::new();
        if opts.preview {
            tracing::info!("preview run; nothing published");
        } else if per_file.is_empty() {
            tracing::warn!(listed = names.len(), "no artifact could be fetched; nothing published");
        } else {
            let publisher = Publisher::new(&self.client, &self.settings.publish);
            if self.settings.publish_partners {
                published.push(
                    publisher
                        .publish(Table::Partners, date, &partners.rows, opts.clear_first)
                        .await?,
                );
            }
            if self.settings.publish_totals {
                let row = DailyTotalsRow::from_aggregate(&aggregate, updated_at);
                published.push(
                    publisher
                        .publish(Table::Totals, date, std::slice::from_ref(&row), opts.clear_first)
                        .await?,
                );
            }
        }

        let summary = DaySummary {
            files_total: names.len(),
            missing: fetched.missing,
            per_file,
            aggregate,
            partners,
            published,
        };
        tracing::info!(
            used = summary.files_used(),
            total = summary.files_total,
            missing = summary.missing.len(),
            "day complete"
        );
        Ok(DayReport {
            date,
            outcome: DayOutcome::Completed(Box::new(summary)),
        })
    }

    /// Run each date in turn. A failed day is logged and does not stop the
    /// days after it.
    pub async fn run_days(
        &self,
        dates: &[NaiveDate],
        opts: &RunOptions,
    ) -> Vec<(NaiveDate, Result<DayReport, PipelineError>)> {
        let mut results = Vec::with_capacity(dates.len());
        for (i, &date) in dates.iter().enumerate() {
            if i > 0 && !self.settings.pause_between_days.is_zero() {
                tokio::time::sleep(self.settings.pause_between_days).await;
            }
            let result = self.run_day(date, opts).await;
            if let Err(e) = &result {
                tracing::error!(%date, error = %e, "day failed; continuing with the next one");
            }
            results.push((date, result));
        }
        results
    }
}
