use signoff_engine::{Action, Role, WorkflowState};

use crate::OutputFormat;

pub(crate) fn cmd_table(output: OutputFormat) {
    match output {
        OutputFormat::Json => {
            let rows: Vec<serde_json::Value> = Action::ALL
                .into_iter()
                .map(|action| {
                    let transitions: Vec<serde_json::Value> = action
                        .valid_from()
                        .into_iter()
                        .filter_map(|from| {
                            action
                                .transition(from)
                                .map(|to| serde_json::json!({ "from": from, "to": to }))
                        })
                        .collect();
                    serde_json::json!({
                        "action": action,
                        "roles": action.required_roles(),
                        "requires_comment": action.requires_comment(),
                        "transitions": transitions,
                    })
                })
                .collect();
            let doc = serde_json::json!({
                "actions": rows,
                "terminal": WorkflowState::ALL
                    .into_iter()
                    .filter(|s| s.is_terminal())
                    .collect::<Vec<_>>(),
            });
            println!("{}", doc);
        }
        OutputFormat::Text => {
            for action in Action::ALL {
                let roles: Vec<&str> = action.required_roles().iter().map(|r| r.as_str()).collect();
                for from in action.valid_from() {
                    if let Some(to) = action.transition(from) {
                        println!(
                            "{:<22} {:<24} -> {:<24} {}{}",
                            action.as_str(),
                            from.as_str(),
                            to.as_str(),
                            roles.join("|"),
                            if action.requires_comment() {
                                " (comment)"
                            } else {
                                ""
                            }
                        );
                    }
                }
            }
            println!(
                "an {} may perform any structurally valid step; it is audited as an override",
                Role::Administrator
            );
        }
    }
}
