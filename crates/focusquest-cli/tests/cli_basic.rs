//! CLI end-to-end tests against an isolated home directory.

use assert_cmd::Command;
use tempfile::TempDir;

fn cli(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("focusquest-cli").unwrap();
    cmd.env("HOME", home.path()).env("FOCUSQUEST_ENV", "dev");
    cmd
}

fn stdout(cmd: &mut Command) -> String {
    let output = cmd.output().unwrap();
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[test]
fn prints_version() {
    let home = TempDir::new().unwrap();
    let out = stdout(cli(&home).arg("--version"));
    assert!(out.contains("focusquest-cli"));
}

#[test]
fn config_defaults_are_listed() {
    let home = TempDir::new().unwrap();
    let out = stdout(cli(&home).args(["config", "list"]));
    let json: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(json["session"]["focus_minutes"], 25);
    assert_eq!(json["session"]["break_minutes"], 5);

    let out = stdout(cli(&home).args(["config", "get", "session.default_cycles"]));
    assert_eq!(out.trim(), "4");
}

#[test]
fn config_set_round_trips() {
    let home = TempDir::new().unwrap();
    stdout(cli(&home).args(["config", "set", "session.focus_minutes", "50"]));
    let out = stdout(cli(&home).args(["config", "get", "session.focus_minutes"]));
    assert_eq!(out.trim(), "50");

    cli(&home)
        .args(["config", "get", "bogus.key"])
        .assert()
        .failure();
}

#[test]
fn resources_add_list_remove() {
    let home = TempDir::new().unwrap();
    let out = stdout(cli(&home).args(["resources", "add", "ChatGPT.com"]));
    let resource: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(resource["url"], "https://ChatGPT.com");
    assert_eq!(resource["hostname"], "chatgpt.com");

    let out = stdout(cli(&home).args(["resources", "list"]));
    let listed: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let id = resource["id"].as_str().unwrap();
    stdout(cli(&home).args(["resources", "remove", id]));
    let out = stdout(cli(&home).args(["resources", "list"]));
    assert_eq!(out.trim(), "[]");
}

#[test]
fn quest_violation_flow_drains_health() {
    let home = TempDir::new().unwrap();

    let out = stdout(cli(&home).args([
        "quest", "start", "--cycles", "2", "--allow", "chatgpt.com",
    ]));
    assert!(out.contains("QuestStarted"));

    // Monitoring state was seeded for the background context.
    let out = stdout(cli(&home).args(["monitor", "status"]));
    let state: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(state["quest_active"], true);
    assert!(out.contains("chatgpt.com"));

    // An allowed navigation passes.
    let out = stdout(cli(&home).args(["monitor", "check", "2", "https://chat.chatgpt.com/c/1"]));
    assert!(out.contains("allowed"));

    // A disallowed one forces the penalty and drains HP.
    let out = stdout(cli(&home).args(["monitor", "check", "2", "https://evil.com/feed"]));
    assert!(out.contains("evil.com"));
    assert!(out.contains("ViolationReported"));
    assert!(out.contains("HealthDrained"));

    // Coming back stops the drain before it can tick again.
    stdout(cli(&home).args(["quest", "visibility", "visible"]));
    let out = stdout(cli(&home).args(["quest", "status"]));
    assert!(out.contains("\"health\": 90"));

    // Abandoning reports the quest and clears monitoring.
    let out = stdout(cli(&home).args(["quest", "stop"]));
    assert!(out.contains("QuestFailed"));

    let out = stdout(cli(&home).args(["monitor", "status"]));
    let state: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(state["quest_active"], false);

    let out = stdout(cli(&home).args(["stats", "all"]));
    let stats: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(stats["abandoned_quests"], 1);
}

#[test]
fn completing_tasks_finishes_the_quest() {
    let home = TempDir::new().unwrap();
    stdout(cli(&home).args(["quest", "start", "--cycles", "4", "--task", "read chapter 1"]));

    let out = stdout(cli(&home).args(["quest", "status"]));
    assert!(out.contains("\"total_cycles\": 4"));

    let out = stdout(cli(&home).args(["quest", "tasks"]));
    let tasks: serde_json::Value = serde_json::from_str(&out).unwrap();
    let id = tasks[0]["id"].as_str().unwrap().to_string();

    let out = stdout(cli(&home).args(["quest", "task", &id]));
    assert!(out.contains("QuestCompleted"));

    let out = stdout(cli(&home).args(["stats", "all"]));
    let stats: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(stats["completed_quests"], 1);

    let out = stdout(cli(&home).args(["monitor", "status"]));
    let state: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(state["quest_active"], false);
}
