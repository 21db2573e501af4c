pub mod assembler;
pub mod job_runner;
pub mod orchestrator;
