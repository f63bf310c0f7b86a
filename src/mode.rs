use bitflags::bitflags;

bitflags! {
    #[derive(Default, Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct FileSystemPermissions: u32 {
        const NONE = 0;
        const EXECUTE = 1 << 0;
        const WRITE = 1 << 1;
        const READ = 1 << 2;
    }
}

bitflags! {
    #[derive(Default, Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct FileDescriptorType: u32 {
        const FILE = libc::S_IFREG as u32;
        const DIRECTORY = libc::S_IFDIR as u32;
        const SYM_LINK = libc::S_IFLNK as u32;
        const CHAR_DEVICE = libc::S_IFCHR as u32;
        const BLOCK_DEVICE = libc::S_IFBLK as u32;
        const PIPE = libc::S_IFIFO as u32;
        const SOCKET = libc::S_IFSOCK as u32;
        const UNKNOWN = 0;
    }
}

impl FileDescriptorType {

    pub fn from_mode(mode: u32) -> Self {
        Self::from_bits_truncate(mode & libc::S_IFMT as u32)
    }

    // readdir(3) d_type values
    pub fn from_dirent_type(value: u8) -> Self {
        match value {
            libc::DT_BLK => FileDescriptorType::BLOCK_DEVICE,
            libc::DT_CHR => FileDescriptorType::CHAR_DEVICE,
            libc::DT_DIR => FileDescriptorType::DIRECTORY,
            libc::DT_FIFO => FileDescriptorType::PIPE,
            libc::DT_LNK => FileDescriptorType::SYM_LINK,
            libc::DT_REG => FileDescriptorType::FILE,
            libc::DT_SOCK => FileDescriptorType::SOCKET,
            _ => FileDescriptorType::UNKNOWN,
        }
    }

    pub fn from_std(file_type: std::fs::FileType) -> Self {
        if file_type.is_dir() { FileDescriptorType::DIRECTORY }
        else if file_type.is_file() { FileDescriptorType::FILE }
        else if file_type.is_symlink() { FileDescriptorType::SYM_LINK }
        else { FileDescriptorType::UNKNOWN }
    }

    pub fn is_known(&self) -> bool { !self.is_empty() }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileSystemMode {
    pub user_permissions: FileSystemPermissions,
    pub group_permissions: FileSystemPermissions,
    pub other_permissions: FileSystemPermissions,
}

impl FileSystemMode {

    pub fn new(
        user_permissions: FileSystemPermissions,
        group_permissions: FileSystemPermissions,
        other_permissions: FileSystemPermissions,
    ) -> Self {
        Self {
            user_permissions,
            group_permissions,
            other_permissions,
        }
    }

    pub fn private() -> Self {
        Self::new(
            FileSystemPermissions::READ | FileSystemPermissions::WRITE,
            FileSystemPermissions::NONE,
            FileSystemPermissions::NONE,
        )
    }

    pub fn private_executable() -> Self {
        Self::new(
            FileSystemPermissions::all(),
            FileSystemPermissions::NONE,
            FileSystemPermissions::NONE,
        )
    }

    pub fn shared_read_only() -> Self {
        Self::new(
            FileSystemPermissions::READ | FileSystemPermissions::WRITE,
            FileSystemPermissions::READ,
            FileSystemPermissions::READ,
        )
    }

    // 0o755, the usual mode for new directories
    pub fn shared_read_executable() -> Self {
        Self::new(
            FileSystemPermissions::all(),
            FileSystemPermissions::READ | FileSystemPermissions::EXECUTE,
            FileSystemPermissions::READ | FileSystemPermissions::EXECUTE,
        )
    }

    pub fn permissive() -> Self {
        Self::new(
            FileSystemPermissions::all(),
            FileSystemPermissions::all(),
            FileSystemPermissions::all(),
        )
    }

    // A readable directory is useless without search permission.
    pub fn to_directory_safe(self) -> Self {
        fn searchable(p: FileSystemPermissions) -> FileSystemPermissions {
            if p.contains(FileSystemPermissions::READ) {
                p | FileSystemPermissions::EXECUTE
            } else { p }
        }

        Self {
            user_permissions: searchable(self.user_permissions),
            group_permissions: searchable(self.group_permissions),
            other_permissions: searchable(self.other_permissions),
        }
    }

    pub fn bits(&self) -> u32 {
        let user = self.user_permissions.bits() << 6;
        let group = self.group_permissions.bits() << 3;
        let other = self.other_permissions.bits();
        user | group | other
    }

    pub fn from_bits(value: u32) -> Self {
        Self {
            user_permissions: FileSystemPermissions::from_bits_truncate((value >> 6) & 0b111),
            group_permissions: FileSystemPermissions::from_bits_truncate((value >> 3) & 0b111),
            other_permissions: FileSystemPermissions::from_bits_truncate(value & 0b111),
        }
    }
}

impl From<FileSystemMode> for libc::mode_t {
    fn from(value: FileSystemMode) -> Self {
        value.bits() as libc::mode_t
    }
}

impl From<libc::mode_t> for FileSystemMode {
    fn from(value: libc::mode_t) -> Self {
        Self::from_bits(value as u32)
    }
}

impl Default for FileSystemMode {
    fn default() -> Self {
        Self::shared_read_executable()
    }
}
