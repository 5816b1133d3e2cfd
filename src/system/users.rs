use std::collections::HashMap;
use std::path::Path;

use super::fs::FileSystem;

/// uid → login name, built from a passwd-format file.
#[derive(Debug, Clone, Default)]
pub struct UserTable {
    names: HashMap<u32, String>,
}

impl UserTable {
    pub fn parse(content: &str) -> Self {
        let mut names = HashMap::new();
        for line in content.lines() {
            if line.starts_with('#') {
                continue;
            }
            // name:password:uid:gid:gecos:home:shell
            let mut parts = line.split(':');
            let (Some(name), Some(_), Some(uid)) = (parts.next(), parts.next(), parts.next())
            else {
                continue;
            };
            if let Ok(uid) = uid.parse::<u32>() {
                names.entry(uid).or_insert_with(|| name.to_string());
            }
        }
        UserTable { names }
    }

    /// Empty table when the passwd file cannot be read; names then fall
    /// back to numeric uids.
    pub fn load(fs: &dyn FileSystem, path: &Path) -> Self {
        match fs.read_text(path) {
            Ok(content) => Self::parse(&content),
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "user database unavailable");
                Self::default()
            }
        }
    }

    pub fn resolve(&self, uid: u32) -> String {
        self.names
            .get(&uid)
            .cloned()
            .unwrap_or_else(|| uid.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::fs::MockFs;

    #[test]
    fn resolves_known_and_unknown_uids() {
        let table = UserTable::parse(
            "# comment\nroot:x:0:0::/root:/bin/bash\nuser:x:1000:1000::/home/user:/bin/bash\nbroken\n",
        );
        assert_eq!(table.resolve(0), "root");
        assert_eq!(table.resolve(1000), "user");
        assert_eq!(table.resolve(9999), "9999");
    }

    #[test]
    fn first_entry_wins_for_duplicate_uid() {
        let table = UserTable::parse("root:x:0:0::/:/bin/sh\ntoor:x:0:0::/:/bin/sh\n");
        assert_eq!(table.resolve(0), "root");
    }

    #[test]
    fn non_utf8_gecos_keeps_the_table() {
        let mut fs = MockFs::new();
        fs.add_file(
            "/etc/passwd",
            b"root:x:0:0:Ren\xe9:/root:/bin/sh\nalice:x:1000:1000::/home/alice:/bin/sh\n".to_vec(),
        );
        let table = UserTable::load(&fs, Path::new("/etc/passwd"));
        assert_eq!(table.resolve(0), "root");
        assert_eq!(table.resolve(1000), "alice");
    }

    #[test]
    fn missing_file_falls_back_to_numeric() {
        let table = UserTable::load(&MockFs::new(), Path::new("/etc/passwd"));
        assert_eq!(table.resolve(0), "0");
    }
}
