//! Host-side staging directory for one writ. Bind-mounted
//! read-only into the container as `/share`; the three files inside are
//! what the container's entrypoint (`$scratch_dir/runner`) reads.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// A single writ's share directory: `runner`, `input`, `program`, laid
/// out the way the run_script's placeholders expect.
pub struct ScratchDir {
    dir: tempfile::TempDir,
}

impl ScratchDir {
    /// Render `run_script`'s placeholders and write all three files.
    /// `$scratch_dir` is the container-side mount point (`/share`),
    /// `$input_file`/`$program_file` are paths under it.
    pub fn create(run_script: &str, input: &str, source_code: &str) -> Result<Self> {
        Self::create_with_root(run_script, input, source_code, "/share")
    }

    /// Same as [`Self::create`], but for the insecure host-exec path: there's
    /// no bind mount standing in for `$scratch_dir`, so the runner is
    /// rendered against this directory's own host path.
    pub fn create_for_host_exec(run_script: &str, input: &str, source_code: &str) -> Result<Self> {
        let dir = tempfile::tempdir().context("creating scratch dir")?;
        let root = dir.path().to_string_lossy().into_owned();
        Self::write_all(dir, run_script, input, source_code, &root)
    }

    fn create_with_root(run_script: &str, input: &str, source_code: &str, root: &str) -> Result<Self> {
        let dir = tempfile::tempdir().context("creating scratch dir")?;
        Self::write_all(dir, run_script, input, source_code, root)
    }

    fn write_all(dir: tempfile::TempDir, run_script: &str, input: &str, source_code: &str, root: &str) -> Result<Self> {
        let rendered = run_script
            .replace("$scratch_dir", root)
            .replace("$input_file", &format!("{root}/input"))
            .replace("$program_file", &format!("{root}/program"));

        write_executable(&dir.path().join("runner"), &normalize_newlines(&rendered))?;
        write_plain(&dir.path().join("input"), &normalize_newlines(input))?;
        write_plain(&dir.path().join("program"), &normalize_newlines(source_code))?;

        Ok(Self { dir })
    }

    pub fn host_path(&self) -> &Path {
        self.dir.path()
    }
}

fn normalize_newlines(s: &str) -> String {
    s.replace("\r\n", "\n")
}

fn write_plain(path: &PathBuf, contents: &str) -> Result<()> {
    std::fs::write(path, contents).with_context(|| format!("writing {}", path.display()))
}

#[cfg(unix)]
fn write_executable(path: &PathBuf, contents: &str) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    write_plain(path, contents)?;
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(perms.mode() | 0o111);
    std::fs::set_permissions(path, perms).with_context(|| format!("chmod +x {}", path.display()))
}

#[cfg(not(unix))]
fn write_executable(path: &PathBuf, contents: &str) -> Result<()> {
    write_plain(path, contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_rendered_and_files_written() {
        let scratch = ScratchDir::create(
            "#!/bin/bash\ncat $input_file | python $program_file\nexit $?\n",
            "15\n",
            "print('hi')",
        )
        .unwrap();

        let runner = std::fs::read_to_string(scratch.host_path().join("runner")).unwrap();
        assert!(runner.contains("/share/input"));
        assert!(runner.contains("/share/program"));
        assert!(!runner.contains("$input_file"));

        let input = std::fs::read_to_string(scratch.host_path().join("input")).unwrap();
        assert_eq!(input, "15\n");
    }

    #[test]
    fn host_exec_renders_its_own_host_path_not_share() {
        let scratch = ScratchDir::create_for_host_exec(
            "#!/bin/bash\ncat $input_file | python $program_file\n",
            "15\n",
            "print('hi')",
        )
        .unwrap();

        let runner = std::fs::read_to_string(scratch.host_path().join("runner")).unwrap();
        let host = scratch.host_path().to_string_lossy();
        assert!(runner.contains(&format!("{host}/input")));
        assert!(runner.contains(&format!("{host}/program")));
        assert!(!runner.contains("/share"));
    }

    #[test]
    fn crlf_is_normalised_in_every_file() {
        let scratch = ScratchDir::create("run\r\n", "in\r\n", "code\r\n").unwrap();
        for name in ["runner", "input", "program"] {
            let contents = std::fs::read_to_string(scratch.host_path().join(name)).unwrap();
            assert!(!contents.contains('\r'));
        }
    }
}
