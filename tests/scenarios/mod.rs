//! Scenario-based tests for pipeline-controller

mod success_run;
mod child_aggregation;
mod transient_errors;
