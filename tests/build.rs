//! End-to-end tests for the `build` pipeline on the fixture site.
//!
//! Each test gets its own copy of `fixtures/site/` with freshly generated
//! rasters, runs the whole graph and inspects the build tree.

mod common;

use common::{digest_tree, list_tree, setup_site};
use simple_assets::config::{CONFIG_FILENAME, Project};
use simple_assets::graph::TaskState;
use simple_assets::pipeline::{self, PipelineKind, PipelineRun};
use simple_assets::tasks::TaskContext;
use std::fs;
use std::path::Path;

fn build(root: &Path) -> (Project, PipelineRun) {
    let project = Project::load(root).unwrap();
    let run = pipeline::run(PipelineKind::Build, TaskContext::new(&project)).unwrap();
    (project, run)
}

fn build_ok(root: &Path) -> Project {
    let (project, run) = build(root);
    pipeline::check(&run).unwrap();
    project
}

#[test]
fn build_writes_expected_layout() {
    let tmp = setup_site();
    let project = build_ok(tmp.path());

    assert_eq!(
        list_tree(&project.build_root()),
        vec![
            "about.html",
            "css/style.min.css",
            "css/style.min.css.map",
            "favicon.ico",
            "fonts/site.woff2",
            "img/hero.jpg",
            "img/hero.webp",
            "img/logo.svg",
            "img/photos/team.png",
            "img/photos/team.webp",
            "img/sprite.svg",
            "index.html",
            "js/script.min.js",
            "manifest.webmanifest",
        ]
    );
}

#[test]
fn build_is_idempotent() {
    let tmp = setup_site();
    let project = build_ok(tmp.path());
    let first = digest_tree(&project.build_root());

    build_ok(tmp.path());
    let second = digest_tree(&project.build_root());

    assert_eq!(first, second);
}

#[test]
fn build_removes_stale_output() {
    let tmp = setup_site();
    let stale = tmp.path().join("build/old/leftover.css");
    fs::create_dir_all(stale.parent().unwrap()).unwrap();
    fs::write(&stale, "body{}").unwrap();

    let project = build_ok(tmp.path());

    assert!(!stale.exists());
    assert!(!project.build_root().join("old").exists());
}

#[test]
fn styles_are_prefixed_for_configured_browsers() {
    let tmp = setup_site();
    fs::write(
        tmp.path().join(CONFIG_FILENAME),
        "[styles]\nbrowsers = [\"safari 13\"]\n",
    )
    .unwrap();

    let project = build_ok(tmp.path());

    let css = fs::read_to_string(project.build_root().join("css/style.min.css")).unwrap();
    assert!(css.contains("-webkit-user-select:none"), "{css}");
    assert!(css.contains("-webkit-backdrop-filter"), "{css}");
}

#[test]
fn styles_are_minified() {
    let tmp = setup_site();
    let project = build_ok(tmp.path());

    let css = fs::read_to_string(project.build_root().join("css/style.min.css")).unwrap();
    let sass_len: usize = ["style.scss", "_variables.scss", "blocks/_header.scss"]
        .iter()
        .map(|f| {
            fs::read_to_string(project.source_root().join("sass").join(f))
                .unwrap()
                .len()
        })
        .sum();

    assert!(css.len() < sass_len);
    // All rules on one line, then the source map link.
    let (rules, link) = css.trim_end().split_once('\n').unwrap();
    assert!(rules.contains('{'), "{rules}");
    assert_eq!(link, "/*# sourceMappingURL=style.min.css.map */");

    let map = fs::read_to_string(project.build_root().join("css/style.min.css.map")).unwrap();
    assert!(map.contains(r#""sources":["sass/style.scss"]"#), "{map}");
    assert!(!css.contains("Layout"));
    // Variables are resolved, partials inlined
    assert!(!css.contains('$'));
    assert!(css.contains(".site-header"));
}

#[test]
fn markup_and_scripts_are_minified() {
    let tmp = setup_site();
    let project = build_ok(tmp.path());
    let source = project.source_root();
    let build = project.build_root();

    let page = fs::read_to_string(build.join("index.html")).unwrap();
    assert!(page.len() < fs::metadata(source.join("index.html")).unwrap().len() as usize);
    assert!(page.contains("<!-- hero -->"));
    assert!(!page.contains("\n    "));

    let js = fs::read_to_string(build.join("js/script.min.js")).unwrap();
    assert!(js.len() < fs::read_to_string(source.join("js/script.js")).unwrap().len());
    assert!(!js.contains("Toggle the mobile navigation"));
}

#[test]
fn icons_only_appear_in_the_sprite() {
    let tmp = setup_site();
    let project = build_ok(tmp.path());
    let build = project.image_build();

    assert!(!build.join("icons").exists());
    let sprite = fs::read_to_string(build.join("sprite.svg")).unwrap();
    assert_eq!(sprite.matches(r#"id="menu""#).count(), 1);
    assert_eq!(sprite.matches(r#"id="cart""#).count(), 1);
    assert_eq!(sprite.matches("<symbol").count(), 2);
    // cart sorts before menu
    assert!(sprite.find(r#"id="cart""#) < sprite.find(r#"id="menu""#));
    // Paint stays inheritable so `.icon { fill: currentColor }` applies.
    assert!(sprite.contains(r#"stroke="currentColor""#));
    assert!(!sprite.contains("#000000"));
}

#[test]
fn standalone_svgs_keep_text_and_view_box() {
    let tmp = setup_site();
    let project = build_ok(tmp.path());

    let logo = fs::read_to_string(project.image_build().join("logo.svg")).unwrap();
    assert!(logo.contains(r#"viewBox="0 0 120 40""#));
    assert!(logo.contains("<title>Logo</title>"));
    assert!(logo.contains(">ACME</text>"));
    assert!(!logo.contains("metadata"));
    assert!(!logo.contains("20.000001"));
}

#[test]
fn missing_icons_dir_skips_the_sprite() {
    let tmp = setup_site();
    fs::remove_dir_all(tmp.path().join("src/img/icons")).unwrap();

    let project = build_ok(tmp.path());

    assert!(!project.image_build().join("sprite.svg").exists());
    assert!(project.image_build().join("logo.svg").is_file());
}

#[test]
fn optimized_rasters_never_grow() {
    let tmp = setup_site();
    let project = build_ok(tmp.path());

    for relative in ["hero.jpg", "photos/team.png"] {
        let before = fs::metadata(project.image_source().join(relative)).unwrap().len();
        let after = fs::metadata(project.image_build().join(relative)).unwrap().len();
        assert!(after <= before, "{relative}: {after} > {before}");
    }
}

#[test]
fn broken_stylesheet_fails_only_styles() {
    let tmp = setup_site();
    fs::write(tmp.path().join("src/sass/style.scss"), ".broken { color: ").unwrap();

    let (project, run) = build(tmp.path());

    assert_eq!(run.state_of("styles"), Some(TaskState::Failed));
    for sibling in ["markup", "scripts", "svg", "sprite", "next-gen-images"] {
        assert_eq!(run.state_of(sibling), Some(TaskState::Completed), "{sibling}");
    }
    let err = pipeline::check(&run).unwrap_err();
    assert_eq!(err.failed, vec!["styles"]);
    assert!(!project.build_root().join("css/style.min.css").exists());
    assert!(project.build_root().join("index.html").is_file());
}

#[test]
fn empty_copy_set_is_not_an_error() {
    let tmp = setup_site();
    fs::write(tmp.path().join(CONFIG_FILENAME), "[copy]\npatterns = []\n").unwrap();

    let project = build_ok(tmp.path());

    assert!(!project.build_root().join("fonts").exists());
    assert!(!project.build_root().join("favicon.ico").exists());
    assert!(project.build_root().join("index.html").is_file());
}
