//! Event-driven wiring: state-change alerts, approval topics and the
//! image-push trigger.

use mlops_core::domain::policy::{assume_role_policy, policy_document};
use mlops_core::{
    Environment, Expr, GraphBuilder, LogicalId, PermissionGrant, ResourceDescriptor,
    ResourceKind,
};
use serde_json::json;

use crate::constructs::pipeline_arn;
use crate::permissions;

pub const STATE_CHANGE_DESCRIPTION: &str = "Listen for codepipeline change events";

/// Terminal execution states that trigger an alert.
pub const ALERT_STATES: &[&str] = &["FAILED", "SUCCEEDED", "STOPPED"];

/// Logical ids of the state-change alert resources for one pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChangeAlerts {
    pub topic: LogicalId,
    pub subscription: LogicalId,
    pub topic_policy: LogicalId,
    pub rule: LogicalId,
}

impl StateChangeAlerts {
    /// Ids derived from the pipeline id: `<pipeline>StageChange` for the
    /// topic and `<pipeline>StateChange` for the rule.
    pub fn for_pipeline(pipeline: &LogicalId) -> Self {
        let topic = pipeline.child("StageChange");
        Self {
            subscription: topic.child("EmailSubscription"),
            topic_policy: topic.child("Policy"),
            rule: pipeline.child("StateChange"),
            topic,
        }
    }

    /// Add the alert resources when `email` is set.
    ///
    /// Returns `None` and adds nothing when alerts are disabled.
    pub fn add(
        builder: &mut GraphBuilder,
        env: &Environment,
        pipeline: &LogicalId,
        email: Option<&str>,
    ) -> Option<Self> {
        let email = email.map(str::trim).filter(|e| !e.is_empty())?;
        let ids = Self::for_pipeline(pipeline);

        builder.add(ResourceDescriptor::new(ids.topic.clone(), ResourceKind::SnsTopic));
        builder.add(email_subscription(ids.subscription.clone(), &ids.topic, email));
        builder.add(
            ResourceDescriptor::new(ids.topic_policy.clone(), ResourceKind::SnsTopicPolicy)
                .with_property(
                    "PolicyDocument",
                    policy_document(vec![json!({
                        "Sid": "0",
                        "Effect": "Allow",
                        "Principal": { "Service": "events.amazonaws.com" },
                        "Action": "sns:Publish",
                        "Resource": Expr::reference(&ids.topic),
                    })]),
                )
                .with_property("Topics", json!([Expr::reference(&ids.topic)])),
        );
        // The rule must not fire before events may publish to the topic.
        builder.add(
            ResourceDescriptor::new(ids.rule.clone(), ResourceKind::EventsRule)
                .with_dependency(&ids.topic_policy)
                .with_property("Description", STATE_CHANGE_DESCRIPTION)
                .with_property(
                    "EventPattern",
                    json!({
                        "source": ["aws.codepipeline"],
                        "resources": [pipeline_arn(env, pipeline)],
                        "detail-type": ["CodePipeline Pipeline Execution State Change"],
                        "detail": { "state": ALERT_STATES },
                    }),
                )
                .with_property("State", "ENABLED")
                .with_property(
                    "Targets",
                    json!([{ "Arn": Expr::reference(&ids.topic), "Id": "Target0" }]),
                ),
        );

        tracing::debug!(topic = %ids.topic, rule = %ids.rule, "state-change alerts enabled");
        Some(ids)
    }
}

/// Topic the approval action publishes to, with `email` subscribed.
///
/// Ids are `<prefix>Topic` and `<prefix>TopicSubscription`.
pub fn approval_topic(builder: &mut GraphBuilder, prefix: &LogicalId, email: &str) -> LogicalId {
    let topic = builder.add(ResourceDescriptor::new(
        prefix.child("Topic"),
        ResourceKind::SnsTopic,
    ));
    builder.add(email_subscription(topic.child("Subscription"), &topic, email));
    topic
}

fn email_subscription(id: LogicalId, topic: &LogicalId, email: &str) -> ResourceDescriptor {
    ResourceDescriptor::new(id, ResourceKind::SnsSubscription)
        .with_property("Protocol", "email")
        .with_property("TopicArn", Expr::reference(topic))
        .with_property("Endpoint", email)
}

/// Rule that starts `pipeline` when `tag` is pushed to `repository`.
///
/// Adds the rule (`<pipeline><action>SourceEventRule`) and the role the
/// rule assumes (`<pipeline>EventsRole`), granted permission to start the
/// pipeline.
pub fn image_push_trigger(
    builder: &mut GraphBuilder,
    env: &Environment,
    pipeline: &LogicalId,
    action: &str,
    repository: &LogicalId,
    tag: &str,
) -> LogicalId {
    let role = builder.add(
        ResourceDescriptor::new(pipeline.child("EventsRole"), ResourceKind::IamRole)
            .with_property(
                "AssumeRolePolicyDocument",
                assume_role_policy("events.amazonaws.com"),
            ),
    );
    let target = pipeline_arn(env, pipeline);

    builder.add(
        ResourceDescriptor::new(
            pipeline.child(&format!("{}SourceEventRule", action)),
            ResourceKind::EventsRule,
        )
        .with_property(
            "EventPattern",
            json!({
                "source": ["aws.ecr"],
                "detail-type": ["ECR Image Action"],
                "detail": {
                    "result": ["SUCCESS"],
                    "repository-name": [Expr::reference(repository)],
                    "image-tag": [tag],
                    "action-type": ["PUSH"],
                },
            }),
        )
        .with_property("State", "ENABLED")
        .with_property(
            "Targets",
            json!([{
                "Arn": target.clone(),
                "Id": "Target0",
                "RoleArn": Expr::get_att(&role, "Arn"),
            }]),
        )
        .with_grant_role(&role)
        .with_grant(PermissionGrant::on_resource(
            target,
            permissions::START_PIPELINE.iter().copied(),
        )),
    )
}
