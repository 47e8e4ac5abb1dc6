mod test_agent_pipeline;
mod test_werk_workflow;
