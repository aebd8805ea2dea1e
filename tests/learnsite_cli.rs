use std::fs;
use std::path::Path;

use learnsite::catalog::Catalog;
use predicates::prelude::*;

static POKEDEX_PNG: &[u8] = &[
    137, 80, 78, 71, 13, 10, 26, 10, 0, 0, 0, 13, 73, 72, 68, 82, 0, 0, 0, 1, 0, 0, 0, 1, 8, 4, 0,
    0, 0, 181, 28, 12, 2, 0, 0, 0, 11, 73, 68, 65, 84, 120, 218, 99, 252, 255, 23, 0, 2, 3, 1, 128,
    110, 220, 25, 0, 0, 0, 0, 73, 69, 78, 68, 174, 66, 96, 130,
];

fn write_content(root: &Path) {
    for chapter in Catalog::builtin().chapters() {
        for sub in &chapter.subchapters {
            let path = root.join(format!("{}.md", sub.content_name()));
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, format!("# {}\n\nSome text.\n", sub.title)).unwrap();
        }
    }
    fs::write(
        root.join("introduction/get-started.md"),
        "# Introduction\n\n![Pokedex](../images/pokedex.png)\n\n<div>__INJECT_GRAPHQL_ENDPOINT__</div>\n",
    )
    .unwrap();
    fs::write(
        root.join("tutorial-react/react-01.md"),
        "# Getting Started\n\n```js@src/index.js\nconsole.log('__NAME__')\n```\n\n<div>__DOWNLOAD_REACT__</div>\n",
    )
    .unwrap();
    fs::create_dir_all(root.join("images")).unwrap();
    fs::write(root.join("images/pokedex.png"), POKEDEX_PNG).unwrap();
}

fn learnsite() -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("learnsite");
    cmd.env_remove("LEARNSITE_LOG")
        .env("LEARNSITE_LAST_UPDATED", "2016-11-30");
    cmd
}

#[test]
fn routes_lists_every_subchapter_and_landing() {
    let output = learnsite().arg("routes").assert().success().get_output().stdout.clone();
    let stdout = String::from_utf8(output).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 24);
    assert_eq!(lines.first(), Some(&"/introduction/get-started"));
    assert!(lines.contains(&"/tutorial-react-native-exponent/rn-04"));
    assert_eq!(lines.last(), Some(&"/"));
}

#[test]
fn render_prints_page_with_widgets() {
    let temp = tempfile::TempDir::new().unwrap();
    write_content(temp.path());

    learnsite()
        .args(["render", "--content"])
        .arg(temp.path())
        .args(["--chapter", "tutorial-react", "--subchapter", "react-01"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "<title>01 - Getting Started - React Track + Apollo Tutorial</title>",
        ))
        .stdout(predicate::str::contains("copy-to-file-path\">src/index.js"))
        .stdout(predicate::str::contains("id=\"graphql-endpoint\""))
        .stdout(predicate::str::contains("Last updated<br>2016-11-30"));
}

#[test]
fn render_uses_state_file_for_name() {
    let temp = tempfile::TempDir::new().unwrap();
    write_content(temp.path());
    let state = temp.path().join("state.json");
    fs::write(
        &state,
        r#"{"hasRead":{},"user":{"projectId":"cixyz","email":"ada@example.com","name":"Ada"},"skippedAuth":false,"initialLoadTimestamp":null}"#,
    )
    .unwrap();

    learnsite()
        .args(["render", "--content"])
        .arg(temp.path())
        .args(["--chapter", "tutorial-react", "--subchapter", "react-01", "--state"])
        .arg(&state)
        .assert()
        .success()
        .stdout(predicate::str::contains("console.log(&#39;Ada&#39;)"))
        .stdout(predicate::str::contains("Download Example"));
}

#[test]
fn render_unknown_route_fails() {
    let temp = tempfile::TempDir::new().unwrap();
    write_content(temp.path());

    learnsite()
        .args(["render", "--content"])
        .arg(temp.path())
        .args(["--chapter", "tutorial-vue", "--subchapter", "react-01"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown route: /tutorial-vue/react-01"));
}

#[test]
fn corrupt_state_file_is_fatal() {
    let temp = tempfile::TempDir::new().unwrap();
    write_content(temp.path());
    let state = temp.path().join("state.json");
    fs::write(&state, "{not json").unwrap();

    learnsite()
        .args(["render", "--content"])
        .arg(temp.path())
        .args(["--chapter", "tutorial-react", "--subchapter", "react-01", "--state"])
        .arg(&state)
        .assert()
        .failure()
        .stderr(predicate::str::contains("parse persisted progress state"));
}

#[test]
fn prerender_writes_every_page_and_refuses_to_overwrite() {
    let temp = tempfile::TempDir::new().unwrap();
    let content = temp.path().join("content");
    write_content(&content);
    let out = temp.path().join("site");

    learnsite()
        .args(["prerender", "--content"])
        .arg(&content)
        .arg("--out")
        .arg(&out)
        .assert()
        .success();

    assert!(out.join("index.html").is_file());
    assert!(out.join("go-further/wrap-up/index.html").is_file());
    assert!(out.join("images/pokedex.png").is_file());
    let intro = fs::read_to_string(out.join("introduction/get-started/index.html")).unwrap();
    assert!(intro.contains("src=\"/images/pokedex.png\""));

    learnsite()
        .args(["prerender", "--content"])
        .arg(&content)
        .arg("--out")
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    learnsite()
        .args(["prerender", "--force", "--content"])
        .arg(&content)
        .arg("--out")
        .arg(&out)
        .assert()
        .success();
}

#[test]
fn prerender_fails_on_content_errors() {
    let temp = tempfile::TempDir::new().unwrap();
    let content = temp.path().join("content");
    write_content(&content);
    fs::write(content.join("excursions/excursion-02.md"), "###### Too deep\n").unwrap();

    learnsite()
        .args(["prerender", "--content"])
        .arg(&content)
        .arg("--out")
        .arg(temp.path().join("site"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported heading level"));

    fs::write(content.join("excursions/excursion-02.md"), "![x](./missing.png)\n").unwrap();
    learnsite()
        .args(["prerender", "--force", "--content"])
        .arg(&content)
        .arg("--out")
        .arg(temp.path().join("site"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing image asset"));
}

#[test]
fn progress_commands_update_the_state_file() {
    let temp = tempfile::TempDir::new().unwrap();
    let state = temp.path().join("state.json");

    learnsite()
        .args(["progress", "mark-read", "--alias", "react-01", "--state"])
        .arg(&state)
        .assert()
        .success();
    learnsite()
        .args(["progress", "select-track", "--alias", "tutorial-vue", "--state"])
        .arg(&state)
        .assert()
        .success();
    learnsite()
        .args(["progress", "skip-auth", "--state"])
        .arg(&state)
        .assert()
        .success();

    learnsite()
        .args(["progress", "show", "--state"])
        .arg(&state)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"react-01\": true"))
        .stdout(predicate::str::contains("\"selectedTrackAlias\": \"tutorial-vue\""))
        .stdout(predicate::str::contains("\"skippedAuth\": true"));

    learnsite()
        .args(["progress", "select-track", "--alias", "excursions", "--state"])
        .arg(&state)
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a track chapter"));
}

#[test]
fn debug_logging_goes_to_stderr() {
    learnsite()
        .env("LEARNSITE_LOG", "debug")
        .arg("routes")
        .assert()
        .success()
        .stderr(predicate::str::contains("parsed cli"));
}
