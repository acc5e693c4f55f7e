//! Base lifecycle: creating, opening and closing the four backing files.

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicU32;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::file::StoreFile;
use super::lock::BaseLock;
use crate::config::StoreConfig;
use crate::error::{JamError, Result};
use crate::format::fixed_header::FixedHeader;
use crate::format::{
    EXT_HEADER, EXT_INDEX, EXT_LASTREAD, EXT_TEXT, FIXED_HEADER_SIZE, INDEX_RECORD_SIZE,
};
use crate::hash::jam_crc;

/// Paths of the four files sharing one prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasePaths {
    pub header: PathBuf,
    pub text: PathBuf,
    pub index: PathBuf,
    pub lastread: PathBuf,
}

impl BasePaths {
    /// Example: `/bbs/msgs/general` → `/bbs/msgs/general.jhr`, `.jdt`, `.jdx`, `.jlr`
    pub fn new(prefix: &Path) -> Self {
        Self {
            header: with_ext(prefix, EXT_HEADER),
            text: with_ext(prefix, EXT_TEXT),
            index: with_ext(prefix, EXT_INDEX),
            lastread: with_ext(prefix, EXT_LASTREAD),
        }
    }
}

/// Append an extension without replacing dots already in the prefix.
fn with_ext(prefix: &Path, ext: &str) -> PathBuf {
    let mut s = prefix.as_os_str().to_os_string();
    s.push(".");
    s.push(ext);
    PathBuf::from(s)
}

/// The open file handles. Dropped together when the base closes.
#[derive(Debug)]
pub(crate) struct BaseFiles {
    pub header: StoreFile,
    pub text: StoreFile,
    pub index: StoreFile,
    pub lastread: StoreFile,
}

impl BaseFiles {
    fn each(&self) -> [&StoreFile; 4] {
        [&self.header, &self.text, &self.index, &self.lastread]
    }
}

/// File sizes and counters of an open base.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BaseStats {
    pub header_bytes: u64,
    pub text_bytes: u64,
    pub index_bytes: u64,
    pub lastread_bytes: u64,
    pub message_count: u32,
    pub fixed: FixedHeader,
}

/// An open JAM message base.
///
/// Owns the four file handles exclusively and caches the fixed header.
/// Every method that moves a file position takes `&mut self`; share a base
/// between threads behind a `Mutex`.
#[derive(Debug)]
pub struct Base {
    prefix: PathBuf,
    paths: BasePaths,
    pub(crate) files: Option<BaseFiles>,
    pub(crate) fixed: FixedHeader,
    options: StoreConfig,
    /// Live `BaseLock` guards taken from this base.
    lock_depth: Arc<AtomicU32>,
}

impl Base {
    /// Open the base at `prefix` with default options, creating it if
    /// the header file does not exist.
    pub fn open(prefix: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(prefix, StoreConfig::default())
    }

    /// Open (or create) the base at `prefix`.
    ///
    /// Any handle opened before a failure is released before returning.
    pub fn open_with(prefix: impl AsRef<Path>, options: StoreConfig) -> Result<Self> {
        let prefix = prefix.as_ref().to_path_buf();
        let paths = BasePaths::new(&prefix);

        let (files, fixed) = if paths.header.exists() {
            open_files(&paths)?
        } else {
            create_new(&paths)?
        };
        Ok(Self::from_parts(prefix, paths, files, fixed, options))
    }

    /// Open the base at `prefix` without ever creating it.
    ///
    /// A missing header file is `NotFound`; nothing is written to disk.
    pub fn open_existing(prefix: impl AsRef<Path>, options: StoreConfig) -> Result<Self> {
        let prefix = prefix.as_ref().to_path_buf();
        let paths = BasePaths::new(&prefix);
        if !paths.header.exists() {
            return Err(JamError::NotFound(format!(
                "no message base at {}",
                prefix.display()
            )));
        }
        let (files, fixed) = open_files(&paths)?;
        Ok(Self::from_parts(prefix, paths, files, fixed, options))
    }

    fn from_parts(
        prefix: PathBuf,
        paths: BasePaths,
        files: BaseFiles,
        fixed: FixedHeader,
        options: StoreConfig,
    ) -> Self {
        Self {
            prefix,
            paths,
            files: Some(files),
            fixed,
            options,
            lock_depth: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Release all four handles. Flush failures are collected, not swallowed.
    pub fn close(&mut self) -> Result<()> {
        let files = self.files.take().ok_or(JamError::BaseNotOpen)?;
        let failures: Vec<(PathBuf, std::io::Error)> = files
            .each()
            .iter()
            .filter_map(|f| f.sync().err().map(|e| (f.path().to_path_buf(), e)))
            .collect();
        drop(files);

        if failures.is_empty() {
            debug!(prefix = %self.prefix.display(), "Base closed");
            Ok(())
        } else {
            Err(JamError::Close(failures))
        }
    }

    pub fn is_open(&self) -> bool {
        self.files.is_some()
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    pub fn paths(&self) -> &BasePaths {
        &self.paths
    }

    pub fn options(&self) -> StoreConfig {
        self.options
    }

    pub(crate) fn files(&mut self) -> Result<&mut BaseFiles> {
        self.files.as_mut().ok_or(JamError::BaseNotOpen)
    }

    pub(crate) fn files_ref(&self) -> Result<&BaseFiles> {
        self.files.as_ref().ok_or(JamError::BaseNotOpen)
    }

    // ── Fixed header ────────────────────────────────────────────

    /// Fixed header as of the last load or flush.
    pub fn fixed_header(&self) -> &FixedHeader {
        &self.fixed
    }

    /// Re-read the fixed header from disk.
    pub fn reload_fixed_header(&mut self) -> Result<FixedHeader> {
        let files = self.files()?;
        let mut buf = [0u8; FIXED_HEADER_SIZE];
        files.header.read_at(0, &mut buf)?;
        let fixed = FixedHeader::decode(&buf)
            .map_err(|reason| JamError::invalid(files.header.path(), reason))?;
        self.fixed = fixed;
        Ok(fixed)
    }

    /// Write the cached fixed header back to disk.
    pub(crate) fn flush_fixed_header(&mut self) -> Result<()> {
        let bytes = self.fixed.encode();
        self.files()?.header.write_at(0, &bytes)
    }

    /// Freshly read count of non-deleted messages. Advisory: it can lag
    /// behind the index after an interrupted write.
    pub fn active_message_count(&mut self) -> Result<u32> {
        Ok(self.reload_fixed_header()?.active_msgs)
    }

    /// External number of slot 1.
    pub fn base_message_number(&self) -> u32 {
        self.fixed.base_msg_num
    }

    /// Change the external number of slot 1.
    pub fn set_base_message_number(&mut self, base_msg_num: u32) -> Result<()> {
        self.with_lock(|base| {
            base.reload_fixed_header()?;
            base.fixed.base_msg_num = base_msg_num;
            base.fixed.mod_counter = base.fixed.mod_counter.wrapping_add(1);
            base.flush_fixed_header()
        })
    }

    /// Set or clear the base password. Only its hash is stored.
    pub fn set_password(&mut self, password: Option<&str>) -> Result<()> {
        let crc = password.map(jam_crc).unwrap_or(0);
        self.with_lock(|base| {
            base.reload_fixed_header()?;
            base.fixed.password_crc = crc;
            base.fixed.mod_counter = base.fixed.mod_counter.wrapping_add(1);
            base.flush_fixed_header()
        })
    }

    /// `true` if the base has no password or `password` matches it.
    pub fn check_password(&self, password: &str) -> bool {
        self.fixed.password_crc == 0 || self.fixed.password_crc == jam_crc(password)
    }

    /// Sizes of the backing files plus the current counters.
    pub fn stats(&mut self) -> Result<BaseStats> {
        let fixed = self.reload_fixed_header()?;
        let message_count = self.message_count()?;
        let files = self.files_ref()?;
        Ok(BaseStats {
            header_bytes: files.header.len()?,
            text_bytes: files.text.len()?,
            index_bytes: files.index.len()?,
            lastread_bytes: files.lastread.len()?,
            message_count,
            fixed,
        })
    }

    // ── Locking ─────────────────────────────────────────────────

    /// Take the base lock by hand.
    ///
    /// Mutating methods called while the guard is alive nest inside it, so
    /// the whole sequence stays exclusive until the guard drops.
    pub fn lock(&self) -> Result<BaseLock> {
        let files = self.files_ref()?;
        BaseLock::acquire(
            files.header.handle(),
            files.header.path(),
            self.options.file_locking,
            &self.lock_depth,
        )
    }

    /// Run `f` as one atomic unit under the base lock.
    ///
    /// Nested calls reuse the outer lock. When `sync_writes` is set, the
    /// files are synced after `f` succeeds, before this guard is dropped.
    pub fn with_lock<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let guard = self.lock()?;
        let out = f(self)?;
        if self.options.sync_writes {
            self.sync_all()?;
        }
        drop(guard);
        Ok(out)
    }

    fn sync_all(&self) -> Result<()> {
        for f in self.files_ref()?.each() {
            f.sync().map_err(|e| JamError::io(f.path(), e))?;
        }
        Ok(())
    }
}

fn now_secs() -> u32 {
    u32::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}

/// Create all four files fresh and write a default fixed header.
fn create_new(paths: &BasePaths) -> Result<(BaseFiles, FixedHeader)> {
    let mut header = StoreFile::create(paths.header.clone())?;
    let text = StoreFile::create(paths.text.clone())?;
    let index = StoreFile::create(paths.index.clone())?;
    let lastread = StoreFile::create(paths.lastread.clone())?;

    let fixed = FixedHeader::new(now_secs());
    header.write_at(0, &fixed.encode())?;
    header
        .sync()
        .map_err(|e| JamError::io(header.path(), e))?;

    info!(path = %paths.header.display(), "Created message base");
    Ok((
        BaseFiles {
            header,
            text,
            index,
            lastread,
        },
        fixed,
    ))
}

/// Open all four files and validate the fixed header.
fn open_files(paths: &BasePaths) -> Result<(BaseFiles, FixedHeader)> {
    let mut header = StoreFile::open(paths.header.clone(), false)?;
    let text = StoreFile::open(paths.text.clone(), false)?;
    let index = StoreFile::open(paths.index.clone(), false)?;
    // Lastread files are commonly created lazily by other tools.
    let lastread = StoreFile::open(paths.lastread.clone(), true)?;

    if header.len()? < FIXED_HEADER_SIZE as u64 {
        return Err(JamError::invalid(
            header.path(),
            "File is shorter than the fixed header",
        ));
    }
    let mut buf = [0u8; FIXED_HEADER_SIZE];
    header.read_at(0, &mut buf)?;
    let fixed =
        FixedHeader::decode(&buf).map_err(|reason| JamError::invalid(header.path(), reason))?;

    let index_len = index.len()?;
    if index_len % INDEX_RECORD_SIZE as u64 != 0 {
        warn!(
            path = %index.path().display(),
            len = index_len,
            "Index length is not a whole number of records; ignoring the tail"
        );
    }

    debug!(
        path = %paths.header.display(),
        active = fixed.active_msgs,
        base = fixed.base_msg_num,
        "Opened message base"
    );
    Ok((
        BaseFiles {
            header,
            text,
            index,
            lastread,
        },
        fixed,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_keep_dots_in_prefix() {
        let paths = BasePaths::new(Path::new("/bbs/fido.general"));
        assert_eq!(paths.header, PathBuf::from("/bbs/fido.general.jhr"));
        assert_eq!(paths.text, PathBuf::from("/bbs/fido.general.jdt"));
        assert_eq!(paths.index, PathBuf::from("/bbs/fido.general.jdx"));
        assert_eq!(paths.lastread, PathBuf::from("/bbs/fido.general.jlr"));
    }

    #[test]
    fn test_create_then_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let prefix = tmp.path().join("local");

        let mut base = Base::open(&prefix).unwrap();
        assert!(base.is_open());
        assert_eq!(base.base_message_number(), 1);
        assert_eq!(base.message_count().unwrap(), 0);
        base.close().unwrap();
        assert!(!base.is_open());

        let base = Base::open(&prefix).unwrap();
        assert_eq!(base.fixed_header().active_msgs, 0);
        assert_eq!(
            std::fs::metadata(&base.paths().header).unwrap().len(),
            FIXED_HEADER_SIZE as u64
        );
    }

    #[test]
    fn test_bad_signature_fails_open() {
        let tmp = tempfile::tempdir().unwrap();
        let prefix = tmp.path().join("bad");
        drop(Base::open(&prefix).unwrap());

        let paths = BasePaths::new(&prefix);
        let mut bytes = std::fs::read(&paths.header).unwrap();
        bytes[0] = b'X';
        std::fs::write(&paths.header, bytes).unwrap();

        let err = Base::open(&prefix).unwrap_err();
        assert!(matches!(err, JamError::InvalidFormat { .. }), "{err}");
    }

    #[test]
    fn test_missing_text_file_fails_open() {
        let tmp = tempfile::tempdir().unwrap();
        let prefix = tmp.path().join("partial");
        drop(Base::open(&prefix).unwrap());
        std::fs::remove_file(BasePaths::new(&prefix).text).unwrap();

        let err = Base::open(&prefix).unwrap_err();
        assert!(matches!(err, JamError::Io { .. }), "{err}");
    }

    #[test]
    fn test_closed_base_rejects_calls() {
        let tmp = tempfile::tempdir().unwrap();
        let mut base = Base::open(tmp.path().join("closed")).unwrap();
        base.close().unwrap();
        assert!(matches!(base.message_count(), Err(JamError::BaseNotOpen)));
        assert!(matches!(base.close(), Err(JamError::BaseNotOpen)));
        assert!(matches!(base.lock(), Err(JamError::BaseNotOpen)));
    }

    #[test]
    fn test_password_hash_only() {
        let tmp = tempfile::tempdir().unwrap();
        let mut base = Base::open(tmp.path().join("pw")).unwrap();
        assert!(base.check_password("anything"));
        base.set_password(Some("Secret")).unwrap();
        assert_eq!(base.fixed_header().password_crc, jam_crc("secret"));
        assert!(base.check_password("SECRET"));
        assert!(!base.check_password("other"));
        base.set_password(None).unwrap();
        assert_eq!(base.fixed_header().password_crc, 0);
    }

    #[test]
    fn test_mutations_bump_mod_counter() {
        let tmp = tempfile::tempdir().unwrap();
        let mut base = Base::open(tmp.path().join("mods")).unwrap();
        base.set_base_message_number(500).unwrap();
        let fixed = base.reload_fixed_header().unwrap();
        assert_eq!(fixed.base_msg_num, 500);
        assert_eq!(fixed.mod_counter, 1);
    }

    #[test]
    fn test_nested_with_lock() {
        let tmp = tempfile::tempdir().unwrap();
        let mut base = Base::open(tmp.path().join("nested")).unwrap();
        base.with_lock(|b| {
            b.set_base_message_number(10)?;
            b.set_base_message_number(20)
        })
        .unwrap();
        assert_eq!(base.reload_fixed_header().unwrap().base_msg_num, 20);
    }

    fn other_handle_can_lock(path: &Path) -> bool {
        use fs2::FileExt;
        let other = std::fs::File::open(path).unwrap();
        let locked = other.try_lock_exclusive().is_ok();
        if locked {
            FileExt::unlock(&other).unwrap();
        }
        locked
    }

    #[test]
    fn test_manual_lock_survives_mutations() {
        let tmp = tempfile::tempdir().unwrap();
        let mut base = Base::open(tmp.path().join("manual")).unwrap();
        let header = base.paths().header.clone();

        let guard = base.lock().unwrap();
        assert!(guard.is_held());
        assert!(!other_handle_can_lock(&header));

        base.set_base_message_number(7).unwrap();
        base.set_password(Some("pw")).unwrap();
        assert!(
            !other_handle_can_lock(&header),
            "lock released by a nested mutation"
        );

        drop(guard);
        assert!(other_handle_can_lock(&header));
    }

    #[test]
    fn test_with_lock_releases_on_error() {
        let tmp = tempfile::tempdir().unwrap();
        let mut base = Base::open(tmp.path().join("err")).unwrap();
        let header = base.paths().header.clone();

        let out: Result<()> = base.with_lock(|_| Err(JamError::InvalidMessage(9)));
        assert!(matches!(out, Err(JamError::InvalidMessage(9))));
        assert!(other_handle_can_lock(&header));
    }

    #[test]
    fn test_open_existing_never_creates() {
        let tmp = tempfile::tempdir().unwrap();
        let prefix = tmp.path().join("typo");

        let err = Base::open_existing(&prefix, StoreConfig::default()).unwrap_err();
        assert!(matches!(err, JamError::NotFound(_)), "{err}");
        let paths = BasePaths::new(&prefix);
        assert!(!paths.header.exists());
        assert!(!paths.text.exists());
        assert!(!paths.index.exists());
        assert!(!paths.lastread.exists());

        drop(Base::open(&prefix).unwrap());
        let base = Base::open_existing(&prefix, StoreConfig::default()).unwrap();
        assert_eq!(base.base_message_number(), 1);
    }
}
