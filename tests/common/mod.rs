#![allow(dead_code)]

use mount_tracker::mount::filesystem::Filesystem;
use mount_tracker::mount::table::MountTable;

/// Entry with empty filesystem options.
pub fn fs(id: u64, source: &str, target: &str, vfs_options: &str) -> Filesystem {
    Filesystem::new(id, source, target, vfs_options, "")
}

pub fn table(entries: &[Filesystem]) -> MountTable {
    MountTable::new(entries.to_vec())
}

/// Small but realistic host: root, boot, tmpfs scratch and one data disk.
pub fn host_baseline() -> MountTable {
    MountTable::new(vec![
        Filesystem::new(22, "/dev/nvme0n1p2", "/", "rw,relatime", "errors=remount-ro"),
        Filesystem::new(23, "proc", "/proc", "rw,nosuid,nodev,noexec,relatime", "rw"),
        Filesystem::new(24, "/dev/nvme0n1p1", "/boot/efi", "rw,relatime", "fmask=0077"),
        Filesystem::new(25, "tmpfs", "/tmp", "rw,nosuid,nodev", "size=8g"),
        Filesystem::new(31, "/dev/sdb1", "/var/openebs/local", "rw,relatime", "discard"),
    ])
}
