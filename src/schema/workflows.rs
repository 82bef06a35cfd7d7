//! GitHub Actions workflow schema
//!
//! Describes the keys and values of a `.github/workflows/*.yml` document.

use super::{NeedsProvider, NodeDesc, ValueDesc};

/// GitHub-hosted runner images plus the default self-hosted labels.
pub const RUNNER_LABELS: &[(&str, &str)] = &[
    ("ubuntu-latest", "Latest Ubuntu runner"),
    ("ubuntu-24.04", "Ubuntu 24.04 runner"),
    ("ubuntu-22.04", "Ubuntu 22.04 runner"),
    ("ubuntu-20.04", "Ubuntu 20.04 runner"),
    ("windows-latest", "Latest Windows Server runner"),
    ("windows-2022", "Windows Server 2022 runner"),
    ("windows-2019", "Windows Server 2019 runner"),
    ("macos-latest", "Latest macOS runner"),
    ("macos-14", "macOS 14 runner"),
    ("macos-13", "macOS 13 runner"),
    ("self-hosted", "Any self-hosted runner"),
    ("linux", "Self-hosted runner on Linux"),
    ("windows", "Self-hosted runner on Windows"),
    ("macos", "Self-hosted runner on macOS"),
    ("x64", "Self-hosted runner on x64"),
    ("arm", "Self-hosted runner on ARM32"),
    ("arm64", "Self-hosted runner on ARM64"),
];

const EVENTS: &[(&str, &str)] = &[
    ("branch_protection_rule", "Branch protection rules changed"),
    ("check_run", "Check run activity"),
    ("check_suite", "Check suite activity"),
    ("create", "A branch or tag was created"),
    ("delete", "A branch or tag was deleted"),
    ("deployment", "A deployment was created"),
    ("deployment_status", "A deployment status was provided"),
    ("discussion", "Discussion activity"),
    ("discussion_comment", "Discussion comment activity"),
    ("fork", "The repository was forked"),
    ("gollum", "A wiki page was created or updated"),
    ("issue_comment", "Issue or pull request comment activity"),
    ("issues", "Issue activity"),
    ("label", "Label activity"),
    ("merge_group", "A pull request was added to a merge queue"),
    ("milestone", "Milestone activity"),
    ("page_build", "A GitHub Pages build ran"),
    ("public", "The repository became public"),
    ("pull_request", "Pull request activity"),
    ("pull_request_review", "Pull request review activity"),
    ("pull_request_review_comment", "Pull request review comment activity"),
    ("pull_request_target", "Pull request activity, run in the context of the base"),
    ("push", "Commits or tags were pushed"),
    ("registry_package", "Package activity"),
    ("release", "Release activity"),
    ("repository_dispatch", "A repository dispatch event was sent through the API"),
    ("schedule", "Scheduled run"),
    ("status", "A commit status changed"),
    ("watch", "The repository was starred"),
    ("workflow_call", "Called by another workflow"),
    ("workflow_dispatch", "Manually triggered"),
    ("workflow_run", "Another workflow ran"),
];

const PERMISSION_SCOPES: &[&str] = &[
    "actions",
    "attestations",
    "checks",
    "contents",
    "deployments",
    "discussions",
    "id-token",
    "issues",
    "packages",
    "pages",
    "pull-requests",
    "repository-projects",
    "security-events",
    "statuses",
];

fn values(entries: &[(&str, &str)]) -> Vec<ValueDesc> {
    entries
        .iter()
        .map(|(value, description)| ValueDesc::described(*value, *description))
        .collect()
}

fn names(entries: &[&str]) -> Vec<ValueDesc> {
    entries.iter().map(|value| ValueDesc::new(*value)).collect()
}

fn strings() -> NodeDesc {
    NodeDesc::sequence(NodeDesc::value())
}

fn env() -> NodeDesc {
    NodeDesc::open_map(NodeDesc::value()).describe("Environment variables")
}

fn event_filters(with_refs: bool) -> NodeDesc {
    let mut keys = vec![("types", strings().describe("Activity types that trigger the workflow"))];
    if with_refs {
        keys.extend([
            ("branches", strings().describe("Branch name patterns to include")),
            ("branches-ignore", strings().describe("Branch name patterns to exclude")),
            ("tags", strings().describe("Tag name patterns to include")),
            ("tags-ignore", strings().describe("Tag name patterns to exclude")),
            ("paths", strings().describe("File path patterns to include")),
            ("paths-ignore", strings().describe("File path patterns to exclude")),
        ]);
    }
    NodeDesc::map(keys)
}

fn dispatch_input() -> NodeDesc {
    NodeDesc::map([
        ("description", NodeDesc::value()),
        ("required", NodeDesc::value()),
        ("default", NodeDesc::value()),
        (
            "type",
            NodeDesc::allowed(names(&["boolean", "choice", "environment", "number", "string"])),
        ),
        ("options", strings().describe("Choices for a `choice` input")),
    ])
}

fn call_input() -> NodeDesc {
    NodeDesc::map([
        ("description", NodeDesc::value()),
        ("required", NodeDesc::value()),
        ("default", NodeDesc::value()),
        ("type", NodeDesc::allowed(names(&["boolean", "number", "string"]))),
    ])
    .require(&["type"])
}

fn on() -> NodeDesc {
    let mut events = Vec::new();
    for (event, description) in EVENTS {
        let desc = match *event {
            "push" | "pull_request" | "pull_request_target" => event_filters(true),
            "schedule" => NodeDesc::sequence(
                NodeDesc::map([("cron", NodeDesc::value().describe("POSIX cron syntax, UTC"))])
                    .require(&["cron"]),
            ),
            "workflow_dispatch" => NodeDesc::map([(
                "inputs",
                NodeDesc::open_map(dispatch_input()).describe("Inputs of a manual run"),
            )]),
            "workflow_call" => NodeDesc::map([
                ("inputs", NodeDesc::open_map(call_input())),
                (
                    "outputs",
                    NodeDesc::open_map(
                        NodeDesc::map([("description", NodeDesc::value()), ("value", NodeDesc::value())])
                            .require(&["value"]),
                    ),
                ),
                (
                    "secrets",
                    NodeDesc::open_map(NodeDesc::map([
                        ("description", NodeDesc::value()),
                        ("required", NodeDesc::value()),
                    ])),
                ),
            ]),
            "workflow_run" => NodeDesc::map([
                ("workflows", strings()),
                ("types", strings()),
                ("branches", strings()),
                ("branches-ignore", strings()),
            ]),
            _ => event_filters(false),
        };
        events.push((*event, desc.describe(*description)));
    }

    NodeDesc::one_of([
        NodeDesc::allowed(values(EVENTS)),
        NodeDesc::sequence(NodeDesc::allowed(values(EVENTS))),
        NodeDesc::map(events),
    ])
    .describe("Events that trigger the workflow")
}

fn permissions() -> NodeDesc {
    let level = || NodeDesc::allowed(names(&["read", "write", "none"]));
    NodeDesc::one_of([
        NodeDesc::allowed(names(&["read-all", "write-all"])),
        NodeDesc::map(PERMISSION_SCOPES.iter().map(|scope| (*scope, level()))),
    ])
    .describe("Permissions granted to the GITHUB_TOKEN")
}

fn defaults() -> NodeDesc {
    NodeDesc::map([(
        "run",
        NodeDesc::map([
            ("shell", NodeDesc::value()),
            ("working-directory", NodeDesc::value()),
        ]),
    )])
    .describe("Default settings for `run` steps")
}

fn concurrency() -> NodeDesc {
    NodeDesc::one_of([
        NodeDesc::value(),
        NodeDesc::map([
            ("group", NodeDesc::value()),
            ("cancel-in-progress", NodeDesc::value()),
        ])
        .require(&["group"]),
    ])
    .describe("Only one run in the same concurrency group runs at a time")
}

fn container() -> NodeDesc {
    NodeDesc::one_of([
        NodeDesc::value(),
        NodeDesc::map([
            ("image", NodeDesc::value()),
            (
                "credentials",
                NodeDesc::map([("username", NodeDesc::value()), ("password", NodeDesc::value())]),
            ),
            ("env", env()),
            ("ports", strings()),
            ("volumes", strings()),
            ("options", NodeDesc::value()),
        ]),
    ])
}

fn strategy() -> NodeDesc {
    let entries = || NodeDesc::sequence(NodeDesc::open_map(NodeDesc::value()));
    let matrix_values = NodeDesc::one_of([
        NodeDesc::value(),
        NodeDesc::sequence(NodeDesc::one_of([
            NodeDesc::value(),
            NodeDesc::open_map(NodeDesc::value()),
        ])),
    ]);

    NodeDesc::map([
        (
            "matrix",
            NodeDesc::one_of([
                NodeDesc::value(),
                NodeDesc::map([
                    ("include", entries().describe("Extra matrix combinations")),
                    ("exclude", entries().describe("Matrix combinations to leave out")),
                ])
                .additional(matrix_values),
            ])
            .describe("Build matrix; each key is a variable and each value a list of options"),
        ),
        ("fail-fast", NodeDesc::value()),
        ("max-parallel", NodeDesc::value()),
    ])
}

fn step() -> NodeDesc {
    NodeDesc::map([
        ("id", NodeDesc::value().describe("Identifier used to reference the step in expressions")),
        ("if", NodeDesc::expression().describe("Run the step only when the condition holds")),
        ("name", NodeDesc::value().describe("Name of the step")),
        ("uses", NodeDesc::value().describe("Action to run")),
        ("run", NodeDesc::value().describe("Command line programs to run")),
        ("shell", NodeDesc::value()),
        ("with", NodeDesc::open_map(NodeDesc::value()).describe("Action inputs")),
        ("env", env()),
        ("continue-on-error", NodeDesc::value()),
        ("timeout-minutes", NodeDesc::value()),
        ("working-directory", NodeDesc::value()),
    ])
}

fn job() -> NodeDesc {
    NodeDesc::map([
        ("name", NodeDesc::value().describe("Name of the job displayed on GitHub")),
        (
            "needs",
            NodeDesc::sequence(NodeDesc::value().provider(NeedsProvider))
                .describe("Jobs that must complete successfully before this job runs"),
        ),
        (
            "runs-on",
            NodeDesc::one_of([
                NodeDesc::sequence(NodeDesc::allowed(values(RUNNER_LABELS))),
                NodeDesc::map([("group", NodeDesc::value()), ("labels", strings())]),
            ])
            .describe("The type of machine to run the job on"),
        ),
        ("permissions", permissions()),
        (
            "environment",
            NodeDesc::one_of([
                NodeDesc::value(),
                NodeDesc::map([("name", NodeDesc::value()), ("url", NodeDesc::value())])
                    .require(&["name"]),
            ])
            .describe("Environment the job references"),
        ),
        ("concurrency", concurrency()),
        ("outputs", NodeDesc::open_map(NodeDesc::value()).describe("Outputs available to dependent jobs")),
        ("env", env()),
        ("defaults", defaults()),
        ("if", NodeDesc::expression().describe("Run the job only when the condition holds")),
        ("steps", NodeDesc::sequence(step()).describe("Sequence of tasks")),
        ("timeout-minutes", NodeDesc::value()),
        ("strategy", strategy()),
        ("continue-on-error", NodeDesc::value()),
        ("container", container()),
        ("services", NodeDesc::open_map(container())),
        ("uses", NodeDesc::value().describe("Reusable workflow to call")),
        ("with", NodeDesc::open_map(NodeDesc::value())),
        (
            "secrets",
            NodeDesc::one_of([
                NodeDesc::allowed(names(&["inherit"])),
                NodeDesc::open_map(NodeDesc::value()),
            ]),
        ),
    ])
}

/// Root description of a workflow document.
pub fn workflow_schema() -> NodeDesc {
    NodeDesc::map([
        ("name", NodeDesc::value().describe("Name of the workflow")),
        ("run-name", NodeDesc::value().describe("Name of workflow runs")),
        ("on", on()),
        ("permissions", permissions()),
        ("env", env()),
        ("defaults", defaults()),
        ("concurrency", concurrency()),
        ("jobs", NodeDesc::open_map(job()).describe("Jobs of the workflow")),
    ])
    .require(&["on", "jobs"])
}
