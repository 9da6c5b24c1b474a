//! Build pipeline stack: graph shape, grants and rendered template.

use std::collections::BTreeSet;

use mlops_core::{Environment, GrantScope, LogicalId, ResourceKind, StackScope};
use mlops_stacks::build::{self, BuildPipelineStack};
use mlops_stacks::{permissions, BuildPipelineProps, PipelineProps, StateChangeAlerts};
use serde_json::json;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn props(email: &str) -> BuildPipelineProps {
    BuildPipelineProps {
        pipeline: PipelineProps::new("foo", "master", "foo-build", "foo-pipeline")
            .with_notifications_email(email),
    }
}

fn synth(email: &str) -> mlops_core::SynthesizedStack {
    let scope = StackScope::new(BuildPipelineStack::DEFAULT_NAME, Environment::agnostic())
        .expect("scope");
    BuildPipelineStack::synthesize(&scope, &props(email)).expect("synthesize")
}

fn set(actions: &[&str]) -> BTreeSet<String> {
    actions.iter().map(|a| a.to_string()).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn empty_email_yields_core_resources_only() {
    let stack = synth("");
    let graph = stack.graph();

    assert_eq!(graph.count(ResourceKind::CodeCommitRepository), 1);
    assert_eq!(graph.count(ResourceKind::CodeBuildProject), 1);
    assert_eq!(graph.count(ResourceKind::CodePipeline), 1);
    assert_eq!(graph.count(ResourceKind::SnsTopic), 0);
    assert_eq!(graph.count(ResourceKind::SnsSubscription), 0);
    assert_eq!(graph.count(ResourceKind::EventsRule), 0);
    assert_eq!(stack.pipeline().stages.len(), 2);

    let project = graph
        .get(&LogicalId::new(build::PROJECT_ID))
        .expect("build project");
    assert_eq!(project.grants().len(), 2);
}

#[test]
fn email_adds_exactly_one_topic_subscription_and_rule() {
    let stack = synth("a@b.com");
    let graph = stack.graph();
    let alerts = StateChangeAlerts::for_pipeline(&LogicalId::new(build::PIPELINE_ID));

    assert_eq!(graph.count(ResourceKind::SnsTopic), 1);
    assert_eq!(graph.count(ResourceKind::SnsSubscription), 1);
    assert_eq!(graph.count(ResourceKind::EventsRule), 1);

    let rule = graph.get(&alerts.rule).expect("state-change rule");
    let pattern = rule.property("EventPattern").expect("pattern");
    assert_eq!(pattern["detail"]["state"], json!(["FAILED", "SUCCEEDED", "STOPPED"]));
    assert_eq!(
        rule.property("Targets").expect("targets")[0]["Arn"],
        json!({ "Ref": "MlopsBuildPipelineStageChange" })
    );

    let subscription = graph.get(&alerts.subscription).expect("subscription");
    assert_eq!(subscription.property("Protocol"), Some(&json!("email")));
    assert_eq!(subscription.property("Endpoint"), Some(&json!("a@b.com")));
}

#[test]
fn state_change_rule_waits_for_topic_policy() {
    let template = synth("a@b.com").template();
    assert_eq!(
        template["Resources"]["MlopsBuildPipelineStateChange"]["DependsOn"],
        json!(["MlopsBuildPipelineStageChangePolicy"])
    );
    assert!(synth("").template()["Resources"]
        .get("MlopsBuildPipelineStateChange")
        .is_none());
}

#[test]
fn grant_action_sets_match_exactly() {
    let stack = synth("");
    let project = stack
        .graph()
        .get(&LogicalId::new(build::PROJECT_ID))
        .expect("build project");
    let grants = project.grants();

    let pull: BTreeSet<String> = grants[0].actions().iter().cloned().collect();
    assert_eq!(pull, set(permissions::CODECOMMIT_PULL));
    assert_eq!(
        grants[0].scope(),
        &GrantScope::Resource(mlops_core::Expr::get_att(
            &LogicalId::new(build::REPOSITORY_ID),
            "Arn"
        ))
    );

    let push: BTreeSet<String> = grants[1].actions().iter().cloned().collect();
    assert_eq!(push, set(permissions::ECR_PUSH));
    assert!(grants[1].scope().is_wildcard());
}

#[test]
fn pipeline_stages_wire_source_into_build() {
    let stack = synth("");
    let pipeline = stack.pipeline();
    assert_eq!(pipeline.stage_names(), vec!["GitSource", "Build"]);
    assert_eq!(pipeline.name, "foo-pipeline");

    let template = stack.template();
    let stages = &template["Resources"]["MlopsBuildPipeline"]["Properties"]["Stages"];
    let source = &stages[0]["Actions"][0];
    assert_eq!(source["Name"], json!("MlopsBuildCodeCommit"));
    assert_eq!(source["Configuration"]["BranchName"], json!("master"));
    assert_eq!(source["Configuration"]["PollForSourceChanges"], json!(true));

    let build_action = &stages[1]["Actions"][0];
    assert_eq!(
        build_action["InputArtifacts"][0]["Name"],
        source["OutputArtifacts"][0]["Name"]
    );
}

#[test]
fn template_renders_project_default_policy() {
    let template = synth("").template();
    let resources = &template["Resources"];

    let policy = &resources["MlopsBuildBuildRoleDefaultPolicy"];
    assert_eq!(policy["Type"], json!("AWS::IAM::Policy"));
    assert_eq!(
        policy["Properties"]["Roles"],
        json!([{ "Ref": "MlopsBuildBuildRole" }])
    );
    assert_eq!(
        policy["Properties"]["PolicyDocument"]["Statement"]
            .as_array()
            .map(Vec::len),
        Some(2)
    );

    let depends_on = resources["MlopsBuildBuild"]["DependsOn"]
        .as_array()
        .expect("depends on");
    assert!(depends_on.contains(&json!("MlopsBuildBuildRoleDefaultPolicy")));
}

#[test]
fn clone_url_outputs_reference_repository() {
    let template = synth("").template();
    let outputs = &template["Outputs"];
    assert_eq!(
        outputs["MlopsBuildCodeCommitCloneUrlHttp"]["Value"],
        json!({ "Fn::GetAtt": ["MlopsBuildSourceRepo", "CloneUrlHttp"] })
    );
    assert_eq!(
        outputs["MlopsBuildCodeCommitCloneUrlSsh"]["Description"],
        json!("MLOps: Build CodeCommit Repo CloneUrl SSH")
    );
}

#[test]
fn explicit_environment_becomes_literal_build_variables() {
    let scope = StackScope::new(
        BuildPipelineStack::DEFAULT_NAME,
        Environment::agnostic()
            .with_account("123456789012")
            .with_region("ap-southeast-2"),
    )
    .expect("scope");
    let stack = BuildPipelineStack::synthesize(&scope, &props("")).expect("synthesize");
    let template = stack.template();
    let vars = &template["Resources"]["MlopsBuildBuild"]["Properties"]["Environment"]
        ["EnvironmentVariables"];
    assert_eq!(
        vars[0],
        json!({ "Name": "AWS_ACCOUNT_ID", "Type": "PLAINTEXT", "Value": "123456789012" })
    );
    assert_eq!(vars[1]["Value"], json!("ap-southeast-2"));
}
