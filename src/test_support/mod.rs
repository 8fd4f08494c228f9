//! Test utilities for goforge unit tests.
//!
//! Provides a fake `go` executable (a POSIX shell script) plus helpers to lay
//! out Go modules and Android NDK trees on disk.
//!
//! The fake `go` understands `version`, `tool dist list` and `build`. During
//! `build` it:
//! - appends `GOOS/GOARCH <args>` to `invocations.log` next to the script
//! - fails with a compiler-style message if `FAIL` or `FAIL-<os>-<arch>`
//!   exists in the module root
//! - writes a partial artifact and hangs if `SLEEP` exists in the module root
//! - otherwise writes the concatenated `*.go` sources plus the target to the
//!   `-o` path, and a header next to it for `-buildmode c-shared`

use std::fs;
use std::path::{Path, PathBuf};

use crate::core::target::GoArch;
use crate::builder::toolchain::ndk_clang_path;

/// Ports reported by the fake `go tool dist list`.
pub const FAKE_PORTS: &str = "android/386 android/amd64 android/arm android/arm64 \
linux/386 linux/amd64 linux/arm linux/arm64 windows/386 windows/amd64 darwin/arm64";

const FAKE_GO_SCRIPT: &str = r##"#!/bin/sh
log="$(dirname "$0")/invocations.log"
case "$1" in
  version) echo "go version go1.22.3 linux/amd64"; exit 0 ;;
  tool) for p in __PORTS__; do echo "$p"; done; exit 0 ;;
  build) ;;
  *) echo "go: unknown command $1" >&2; exit 2 ;;
esac
echo "$GOOS/$GOARCH $*" >> "$log"
out=""
mode=""
while [ $# -gt 0 ]; do
  case "$1" in
    -o) out="$2"; shift ;;
    -buildmode) mode="$2"; shift ;;
  esac
  shift
done
if [ -f "FAIL" ] || [ -f "FAIL-$GOOS-$GOARCH" ]; then
  echo "# example.com/core"
  echo "./main.go:3:1: syntax error: unexpected }" >&2
  exit 1
fi
if [ -f "SLEEP" ]; then
  printf 'partial' > "$out"
  exec sleep 30
fi
cat *.go > "$out"
echo "$GOOS/$GOARCH cgo=$CGO_ENABLED" >> "$out"
if [ "$mode" = "c-shared" ]; then
  echo "/* header */" > "${out%.*}.h"
fi
exit 0
"##;

/// Write the fake `go` script into `dir` and return its path.
#[cfg(unix)]
pub fn fake_go(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    fs::create_dir_all(dir).unwrap();
    let path = dir.join("go");
    let ports = FAKE_PORTS.replace(char::is_whitespace, " ");
    fs::write(&path, FAKE_GO_SCRIPT.replace("__PORTS__", &ports)).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Lines of the fake `go` invocation log in `dir`.
pub fn invocations(dir: &Path) -> Vec<String> {
    fs::read_to_string(dir.join("invocations.log"))
        .map(|s| s.lines().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Create an NDK tree under `dir` containing clang for one ABI/API level.
pub fn fake_ndk(dir: &Path, arch: GoArch, api: u32) -> PathBuf {
    let ndk = dir.join("ndk");
    let clang = ndk_clang_path(&ndk, arch, api);
    fs::create_dir_all(clang.parent().unwrap()).unwrap();
    fs::write(&clang, "#!/bin/sh\n").unwrap();
    ndk
}

/// Create a minimal Go module named `name` under `dir`.
pub fn go_module(dir: &Path, name: &str) -> PathBuf {
    let module = dir.join(name);
    fs::create_dir_all(&module).unwrap();
    fs::write(
        module.join("go.mod"),
        format!("module example.com/{}\n\ngo 1.22\n", name),
    )
    .unwrap();
    fs::write(
        module.join("main.go"),
        "package main\n\nfunc main() {}\n",
    )
    .unwrap();
    module
}
