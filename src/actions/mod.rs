//! Scan actions
//!
//! Concrete per-item work: probing objects through a replayed base request,
//! mining captured bodies, and searching captured bodies with a user pattern.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

use crate::aura::{
    discovery_message, object_exists, object_items_message, parse_discovery_response, parse_object_response,
    rewrite_message_param,
};
use crate::capture::CapturedBody;
use crate::http::{Request, Transport};
use crate::mining::{match_findings, Finding, RouteMiner};
use crate::pattern::{Bounded, CompiledPattern, ExecutionOutcome, PatternExecutor};
use crate::results::DiscoveredNameSets;
use crate::scan::{Checkpoint, ItemContext, ItemError, ItemOutcome, ScanAction};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Ask the target for every object it exposes
pub async fn discover_objects(transport: &dyn Transport, base: &Request) -> Result<DiscoveredNameSets> {
    let request = rewrite_message_param(base, &discovery_message());
    let response = transport
        .send(&request)
        .await
        .context("Discovery request failed")?;

    let names = parse_discovery_response(&response.body_text()).with_context(|| {
        if response.is_success() {
            format!("Discovery response not usable (HTTP {})", response.status)
        } else {
            format!("Discovery request rejected (HTTP {})", response.status)
        }
    })?;

    tracing::info!(
        standard = names.standard().len(),
        custom = names.custom().len(),
        "Discovered objects"
    );
    Ok(names)
}

/// Discovered names that `pattern` matches, keeping the standard/custom split
///
/// Each name is tested under the executor's budget; a name whose test times
/// out is left out.
pub async fn filter_names(
    names: &DiscoveredNameSets,
    pattern: &CompiledPattern,
    executor: &PatternExecutor,
) -> DiscoveredNameSets {
    let mut kept = DiscoveredNameSets::new();
    for name in names.all() {
        if executor.matches_any(pattern, name).await {
            kept.insert(name);
        }
    }

    tracing::debug!(pattern = %pattern.source(), kept = kept.len(), of = names.len(), "Filtered object names");
    kept
}

/// Retrieves the records of one object per item
pub struct ObjectProbeAction {
    transport: Arc<dyn Transport>,
    base: Request,
}

impl ObjectProbeAction {
    pub fn new(transport: Arc<dyn Transport>, base: Request) -> Self {
        Self { transport, base }
    }
}

#[async_trait]
impl ScanAction<String> for ObjectProbeAction {
    async fn perform(&self, object: &String, ctx: &ItemContext) -> Result<ItemOutcome, ItemError> {
        let request = rewrite_message_param(&self.base, &object_items_message(object));

        ctx.checkpoint(Checkpoint::BeforeSend)?;
        let response = self
            .transport
            .send(&request)
            .await
            .with_context(|| format!("Request for object '{}' failed", object))?;
        ctx.checkpoint(Checkpoint::AfterReceive)?;

        let body = response.body_text();
        if !object_exists(&body) {
            tracing::debug!(item = %object, status = response.status, "Object not accessible");
            return Ok(ItemOutcome::none());
        }

        ctx.checkpoint(Checkpoint::BeforeParse)?;
        let records = parse_object_response(&body, object)
            .with_context(|| format!("Unexpected response for object '{}'", object))?;

        let retrieved_at = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
        Ok(ItemOutcome::entry(
            object.clone(),
            records.render(self.base.id, &retrieved_at),
        ))
    }
}

fn findings_outcome(findings: Vec<Finding>) -> ItemOutcome {
    let mut outcome = ItemOutcome::none();
    for finding in findings {
        outcome.push(finding.value.clone(), finding.payload());
    }
    outcome
}

/// Mines routes and descriptors from each captured body
///
/// Mining runs under the executor's budget so a pathological body cannot
/// stall the scan.
pub struct CaptureMiningAction {
    miner: RouteMiner,
    executor: PatternExecutor,
}

impl CaptureMiningAction {
    pub fn new(miner: RouteMiner, executor: PatternExecutor) -> Self {
        Self { miner, executor }
    }
}

#[async_trait]
impl ScanAction<CapturedBody> for CaptureMiningAction {
    async fn perform(&self, body: &CapturedBody, ctx: &ItemContext) -> Result<ItemOutcome, ItemError> {
        ctx.checkpoint(Checkpoint::BeforeParse)?;

        let miner = self.miner.clone();
        let text: Arc<str> = body.text.as_str().into();
        let source = body.url.clone();

        match self
            .executor
            .run_bounded(move |_| miner.mine(&text, &source))
            .await
        {
            Bounded::Done(findings) => Ok(findings_outcome(findings)),
            Bounded::TimedOut => Err(anyhow!("Mining {} timed out after {:?}", body.url, self.executor.budget()).into()),
            Bounded::Failed(e) => Err(anyhow!("Mining {} failed: {}", body.url, e).into()),
        }
    }
}

/// Searches each captured body with one accepted pattern
pub struct PatternSearchAction {
    pattern: CompiledPattern,
    executor: PatternExecutor,
}

impl PatternSearchAction {
    pub fn new(pattern: CompiledPattern, executor: PatternExecutor) -> Self {
        Self { pattern, executor }
    }
}

#[async_trait]
impl ScanAction<CapturedBody> for PatternSearchAction {
    async fn perform(&self, body: &CapturedBody, ctx: &ItemContext) -> Result<ItemOutcome, ItemError> {
        ctx.checkpoint(Checkpoint::BeforeParse)?;

        let text: Arc<str> = body.text.as_str().into();
        match self.executor.find_all(&self.pattern, text.clone()).await {
            ExecutionOutcome::Matches(spans) => Ok(findings_outcome(match_findings(&text, &spans, &body.url))),
            ExecutionOutcome::TimedOut => Err(anyhow!("Search of {} timed out", body.url).into()),
            ExecutionOutcome::Failed(e) => Err(anyhow!("Search of {} failed: {}", body.url, e).into()),
        }
    }
}
