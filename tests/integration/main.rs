//! Integration tests for osrc

mod support {
    use std::fs::File;
    use std::io::Write;
    use std::path::{Path, PathBuf};
    use zip::write::FileOptions;
    use zip::ZipWriter;

    /// A class file declaring only `public static void main(String[])`
    pub fn main_class(name: &str) -> Vec<u8> {
        fn utf8(pool: &mut Vec<Vec<u8>>, value: &str) -> u16 {
            let mut entry = vec![1u8];
            entry.extend_from_slice(&(value.len() as u16).to_be_bytes());
            entry.extend_from_slice(value.as_bytes());
            pool.push(entry);
            pool.len() as u16
        }

        let mut pool: Vec<Vec<u8>> = Vec::new();
        let name_index = utf8(&mut pool, &name.replace('.', "/"));
        pool.push(vec![7, (name_index >> 8) as u8, name_index as u8]);
        let this_class = pool.len() as u16;
        let object = utf8(&mut pool, "java/lang/Object");
        pool.push(vec![7, (object >> 8) as u8, object as u8]);
        let super_class = pool.len() as u16;
        let main = utf8(&mut pool, "main");
        let descriptor = utf8(&mut pool, "([Ljava/lang/String;)V");

        let mut out = Vec::new();
        out.extend_from_slice(&0xCAFE_BABEu32.to_be_bytes());
        out.extend_from_slice(&[0, 0, 0, 52]);
        out.extend_from_slice(&((pool.len() + 1) as u16).to_be_bytes());
        for entry in &pool {
            out.extend_from_slice(entry);
        }
        out.extend_from_slice(&0x0021u16.to_be_bytes());
        out.extend_from_slice(&this_class.to_be_bytes());
        out.extend_from_slice(&super_class.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&1u16.to_be_bytes());
        out.extend_from_slice(&0x0009u16.to_be_bytes());
        out.extend_from_slice(&main.to_be_bytes());
        out.extend_from_slice(&descriptor.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out
    }

    pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) -> PathBuf {
        let mut writer = ZipWriter::new(File::create(path).unwrap());
        for (name, content) in entries {
            writer.start_file(*name, FileOptions::default()).unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap();
        path.to_path_buf()
    }

    /// A plain application jar with one main class and a resource
    pub fn app_jar(dir: &Path) -> PathBuf {
        let class = main_class("com.acme.App");
        write_zip(
            &dir.join("app.jar"),
            &[
                ("com/acme/App.class", &class),
                ("application.properties", b"name=app\n"),
            ],
        )
    }

    pub fn library_jar(dir: &Path, name: &str) -> PathBuf {
        write_zip(&dir.join(name), &[("lib/Util.class", b"util")])
    }
}

mod cli_tests {
    use super::support::{app_jar, library_jar, main_class};
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs::{self, File};
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;
    use zip::ZipArchive;

    /// Command isolated from the user's global and local configuration
    fn osrc(temp: &Path) -> Command {
        let mut cmd = cargo_bin_cmd!("osrc");
        cmd.env("OSRC_CONFIG", temp.join("config.toml"))
            .arg("--no-local")
            .current_dir(temp);
        cmd
    }

    fn package(temp: &TempDir, layered: bool) -> PathBuf {
        let jar = app_jar(temp.path());
        let lib = library_jar(temp.path(), "commons-lang3-3.12.0.jar");
        let dest = temp.path().join("out").join("app.jar");
        let mut cmd = osrc(temp.path());
        cmd.arg("package")
            .arg(&jar)
            .arg("--dest")
            .arg(&dest)
            .arg("--library")
            .arg(format!("{}:runtime", lib.display()));
        if layered {
            cmd.arg("--layered");
        }
        cmd.assert().success();
        dest
    }

    fn entry_names(path: &Path) -> Vec<String> {
        let archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
        archive.file_names().map(str::to_string).collect()
    }

    #[test]
    fn help_displays() {
        let temp = TempDir::new().unwrap();
        osrc(temp.path())
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("build-image"));
    }

    #[test]
    fn version_displays() {
        let temp = TempDir::new().unwrap();
        osrc(temp.path())
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("osrc"));
    }

    #[test]
    fn package_writes_executable_archive() {
        let temp = TempDir::new().unwrap();
        let dest = package(&temp, false);

        let names = entry_names(&dest);
        assert!(names.contains(&"META-INF/MANIFEST.MF".to_string()));
        assert!(names.contains(&"BOOT-INF/classes/com/acme/App.class".to_string()));
        assert!(names.contains(&"BOOT-INF/lib/commons-lang3-3.12.0.jar".to_string()));
        assert!(names.contains(&"BOOT-INF/classpath.idx".to_string()));
        assert!(names.contains(&"META-INF/osrc/app.json".to_string()));
        // --dest leaves the source untouched and without a backup
        assert!(!temp.path().join("app.jar.original").exists());
    }

    #[test]
    fn package_in_place_keeps_backup() {
        let temp = TempDir::new().unwrap();
        let jar = app_jar(temp.path());
        osrc(temp.path())
            .arg("package")
            .arg(&jar)
            .assert()
            .success()
            .stdout(predicate::str::contains("com.acme.App"));
        assert!(temp.path().join("app.jar.original").is_file());

        // A second run sees the marker and leaves the archive alone
        osrc(temp.path())
            .arg("package")
            .arg(&jar)
            .assert()
            .success()
            .stdout(predicate::str::contains("already repackaged"));
    }

    #[test]
    fn package_ambiguous_main_class_fails() {
        let temp = TempDir::new().unwrap();
        let a = main_class("com.acme.A");
        let b = main_class("com.acme.B");
        let jar = super::support::write_zip(
            &temp.path().join("two.jar"),
            &[("com/acme/A.class", &a), ("com/acme/B.class", &b)],
        );
        osrc(temp.path())
            .arg("package")
            .arg(&jar)
            .assert()
            .failure()
            .stderr(predicate::str::contains("com.acme.A"));
    }

    #[test]
    fn package_missing_source_fails() {
        let temp = TempDir::new().unwrap();
        osrc(temp.path())
            .args(["package", "missing.jar"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Error:"));
    }

    #[test]
    fn layers_list_shows_index_order() {
        let temp = TempDir::new().unwrap();
        let dest = package(&temp, true);

        let output = osrc(temp.path())
            .args(["layers", "list"])
            .arg(&dest)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let listed = String::from_utf8(output).unwrap();
        let layers: Vec<&str> = listed.lines().collect();
        let dependencies = layers.iter().position(|l| *l == "dependencies").unwrap();
        let application = layers.iter().position(|l| *l == "application").unwrap();
        assert!(dependencies < application);
    }

    #[test]
    fn layers_extract_writes_layer_directories() {
        let temp = TempDir::new().unwrap();
        let dest = package(&temp, true);
        let extracted = temp.path().join("extracted");

        osrc(temp.path())
            .args(["layers", "extract"])
            .arg(&dest)
            .arg("--destination")
            .arg(&extracted)
            .assert()
            .success();

        assert!(extracted
            .join("dependencies/BOOT-INF/lib/commons-lang3-3.12.0.jar")
            .is_file());
        assert!(extracted
            .join("application/BOOT-INF/classes/com/acme/App.class")
            .is_file());
    }

    #[test]
    fn layers_list_rejects_plain_archive() {
        let temp = TempDir::new().unwrap();
        let dest = package(&temp, false);
        osrc(temp.path())
            .args(["layers", "list"])
            .arg(&dest)
            .assert()
            .failure()
            .stderr(predicate::str::contains("not a layered archive"));
    }

    #[test]
    fn launch_dry_run_prints_command() {
        let temp = TempDir::new().unwrap();
        let dest = package(&temp, false);

        osrc(temp.path())
            .args(["launch", "--dry-run"])
            .arg(&dest)
            .args(["--", "--server.port=9000"])
            .assert()
            .success()
            .stdout(predicate::str::contains("com.acme.App"))
            .stdout(predicate::str::contains("commons-lang3-3.12.0.jar"))
            .stdout(predicate::str::contains("--server.port=9000"));
    }

    #[test]
    fn launch_unknown_entry_exits_with_selection_error() {
        let temp = TempDir::new().unwrap();
        let dest = package(&temp, false);

        osrc(temp.path())
            .args(["launch", "--dry-run"])
            .arg(&dest)
            .args(["--", "--osrc.main=com.acme.Missing"])
            .assert()
            .code(255);
    }

    #[test]
    fn scan_lists_main_classes() {
        let temp = TempDir::new().unwrap();
        let classes = temp.path().join("classes/com/acme");
        fs::create_dir_all(&classes).unwrap();
        fs::write(classes.join("App.class"), main_class("com.acme.App")).unwrap();
        fs::write(classes.join("Helper.class"), b"not a class").unwrap();

        osrc(temp.path())
            .args(["scan", "classes"])
            .assert()
            .success()
            .stdout(predicate::str::contains("com.acme.App"))
            .stdout(predicate::str::contains("Helper").not());
    }

    #[test]
    fn config_path() {
        let temp = TempDir::new().unwrap();
        osrc(temp.path())
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let temp = TempDir::new().unwrap();
        osrc(temp.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[buildpack]"));
    }

    #[test]
    fn config_set_local_writes_project_file() {
        let temp = TempDir::new().unwrap();
        osrc(temp.path())
            .args(["config", "set", "--local", "package.layered", "true"])
            .assert()
            .success();
        let local = fs::read_to_string(temp.path().join(".osrc.toml")).unwrap();
        assert!(local.contains("layered = true"));
    }

    #[test]
    fn completions_generate() {
        let temp = TempDir::new().unwrap();
        osrc(temp.path())
            .args(["completions", "bash"])
            .assert()
            .success()
            .stdout(predicate::str::contains("osrc"));
    }
}
