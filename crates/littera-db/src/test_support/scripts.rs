//! Shell stand-ins for the engine executables.
//!
//! Each script records its arguments in `<bin>/<name>.calls` next to the link
//! it was invoked through, so every [`super::FakeEngine`] keeps its own
//! history while sharing one copy of the scripts.

pub(super) const INITDB: &str = r#"#!/bin/sh
bin_dir=$(dirname "$0")
echo "$*" >> "$bin_dir/initdb.calls"
if [ -f "$bin_dir/initdb.fail" ]; then
  echo "fake initdb failure" >&2
  exit 1
fi
data=""
while [ $# -gt 0 ]; do
  case "$1" in
    -D) data="$2"; shift 2 ;;
    *) shift ;;
  esac
done
mkdir -p "$data" || exit 1
echo 16 > "$data/PG_VERSION"
"#;

pub(super) const PG_CTL: &str = r#"#!/bin/sh
bin_dir=$(dirname "$0")
echo "$*" >> "$bin_dir/pg_ctl.calls"
data=""
log="/dev/null"
action=""
while [ $# -gt 0 ]; do
  case "$1" in
    -D) data="$2"; shift 2 ;;
    -l) log="$2"; shift 2 ;;
    -o|-m) shift 2 ;;
    -w) shift ;;
    *) action="$1"; shift ;;
  esac
done
case "$action" in
  start)
    if [ ! -f "$data/PG_VERSION" ]; then
      echo "pg_ctl: directory \"$data\" is not a database cluster directory" >&2
      exit 1
    fi
    if [ -f "$data/.fake-corrupt" ]; then
      cat "$data/.fake-corrupt" >> "$log"
      echo "pg_ctl: could not start server" >&2
      exit 1
    fi
    if [ -f "$bin_dir/pg_ctl.fail" ]; then
      echo "FATAL:  could not bind IPv4 address: Address already in use" >> "$log"
      echo "pg_ctl: could not start server" >&2
      exit 1
    fi
    sleep 300 >/dev/null 2>&1 </dev/null &
    echo "$!" > "$data/postmaster.pid"
    echo "LOG:  database system is ready to accept connections" >> "$log"
    ;;
  stop)
    if [ ! -f "$data/postmaster.pid" ]; then
      echo "pg_ctl: PID file \"$data/postmaster.pid\" does not exist" >&2
      exit 1
    fi
    pid=$(head -n 1 "$data/postmaster.pid")
    kill "$pid" 2>/dev/null
    rm -f "$data/postmaster.pid"
    ;;
  *)
    echo "pg_ctl: unsupported action \"$action\"" >&2
    exit 2
    ;;
esac
"#;

pub(super) const PG_RESETWAL: &str = r#"#!/bin/sh
bin_dir=$(dirname "$0")
echo "$*" >> "$bin_dir/pg_resetwal.calls"
data=""
while [ $# -gt 0 ]; do
  case "$1" in
    -D) data="$2"; shift 2 ;;
    *) shift ;;
  esac
done
if [ -f "$data/postmaster.pid" ]; then
  echo "pg_resetwal: lock file \"postmaster.pid\" exists" >&2
  exit 1
fi
rm -f "$data/.fake-corrupt"
echo "Write-ahead log reset"
"#;
