#[path = "support/pipeline_harness.rs"]
mod pipeline_harness;

#[path = "pipeline/manual_reply.rs"]
mod manual_reply;
#[path = "pipeline/poller_loop.rs"]
mod poller_loop;
#[path = "pipeline/properties.rs"]
mod properties;
#[path = "pipeline/scenarios.rs"]
mod scenarios;
