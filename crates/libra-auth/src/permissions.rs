//! 封闭的权限注册表：(group, alias, description) 声明式表，种子进程按 alias 幂等写入。
//! 授权判定始终是集合成员测试，注册表只负责枚举系统已知的权限。

/// 保留角色别名
pub struct DefaultRole;

impl DefaultRole {
    /// 注册时分配的默认角色，受保护不可删除
    pub const USER: &'static str = "user";
    /// 绕过所有权限检查的保留角色，不出现在普通角色列表中
    pub const SUPERADMIN: &'static str = "superadmin";

    pub fn all() -> Vec<&'static str> {
        vec![Self::USER, Self::SUPERADMIN]
    }
}

/// 权限分组
pub struct PermissionGroup;

impl PermissionGroup {
    pub const USER: &'static str = "user";
    pub const ROLE: &'static str = "role";
    pub const PERMISSION: &'static str = "permission";
    pub const AUTHOR: &'static str = "author";
    pub const BOOK: &'static str = "book";
    pub const MEDIA: &'static str = "media";
}

/// 权限常量定义
pub struct Permissions;

impl Permissions {
    // 用户管理
    pub const USER_SHOW: &'static str = "user.show";
    pub const USER_LIST: &'static str = "user.list";
    pub const USER_CREATE: &'static str = "user.create";
    pub const USER_UPDATE: &'static str = "user.update";
    pub const USER_DELETE: &'static str = "user.delete";

    // 角色管理
    pub const ROLE_SHOW: &'static str = "role.show";
    pub const ROLE_LIST: &'static str = "role.list";
    pub const ROLE_CREATE: &'static str = "role.create";
    pub const ROLE_UPDATE: &'static str = "role.update";
    pub const ROLE_DELETE: &'static str = "role.delete";
    pub const PERMISSION_LIST: &'static str = "permission.list";
    pub const PERMISSION_CREATE: &'static str = "permission.create";
    pub const PERMISSION_UPDATE: &'static str = "permission.update";

    // 作者管理
    pub const AUTHOR_SHOW: &'static str = "author.show";
    pub const AUTHOR_LIST: &'static str = "author.list";
    pub const AUTHOR_CREATE: &'static str = "author.create";
    pub const AUTHOR_UPDATE: &'static str = "author.update";
    pub const AUTHOR_DELETE: &'static str = "author.delete";
    pub const AUTHOR_RESTORE: &'static str = "author.restore";
    pub const AUTHOR_FORCE_DELETE: &'static str = "author.force_delete";

    // 图书管理
    pub const BOOK_SHOW: &'static str = "book.show";
    pub const BOOK_LIST: &'static str = "book.list";
    pub const BOOK_CREATE: &'static str = "book.create";
    pub const BOOK_UPDATE: &'static str = "book.update";
    pub const BOOK_DELETE: &'static str = "book.delete";
    pub const BOOK_UPLOAD_IMG: &'static str = "book.upload_img";

    // 媒体管理
    pub const MEDIA_DELETE: &'static str = "media.delete";
}

/// 种子表条目
#[derive(Debug, Clone)]
pub struct SeedPermission {
    pub group: &'static str,
    pub alias: &'static str,
    pub description: &'static str,
}

const fn seed(
    group: &'static str,
    alias: &'static str,
    description: &'static str,
) -> SeedPermission {
    SeedPermission {
        group,
        alias,
        description,
    }
}

/// 启动种子用的完整权限表
pub fn permissions_for_seed() -> Vec<SeedPermission> {
    vec![
        seed(PermissionGroup::USER, Permissions::USER_SHOW, "查看用户"),
        seed(PermissionGroup::USER, Permissions::USER_LIST, "查看用户列表"),
        seed(PermissionGroup::USER, Permissions::USER_CREATE, "创建用户"),
        seed(PermissionGroup::USER, Permissions::USER_UPDATE, "编辑用户"),
        seed(PermissionGroup::USER, Permissions::USER_DELETE, "删除用户"),
        seed(PermissionGroup::ROLE, Permissions::ROLE_SHOW, "查看角色"),
        seed(PermissionGroup::ROLE, Permissions::ROLE_LIST, "查看角色列表"),
        seed(PermissionGroup::ROLE, Permissions::ROLE_CREATE, "创建角色"),
        seed(PermissionGroup::ROLE, Permissions::ROLE_UPDATE, "编辑角色"),
        seed(PermissionGroup::ROLE, Permissions::ROLE_DELETE, "删除角色"),
        seed(
            PermissionGroup::PERMISSION,
            Permissions::PERMISSION_LIST,
            "查看权限列表",
        ),
        seed(
            PermissionGroup::PERMISSION,
            Permissions::PERMISSION_CREATE,
            "创建权限",
        ),
        seed(
            PermissionGroup::PERMISSION,
            Permissions::PERMISSION_UPDATE,
            "编辑权限",
        ),
        seed(PermissionGroup::AUTHOR, Permissions::AUTHOR_SHOW, "查看作者"),
        seed(
            PermissionGroup::AUTHOR,
            Permissions::AUTHOR_LIST,
            "查看作者列表",
        ),
        seed(
            PermissionGroup::AUTHOR,
            Permissions::AUTHOR_CREATE,
            "创建作者",
        ),
        seed(
            PermissionGroup::AUTHOR,
            Permissions::AUTHOR_UPDATE,
            "编辑作者",
        ),
        seed(
            PermissionGroup::AUTHOR,
            Permissions::AUTHOR_DELETE,
            "删除作者（软删除）",
        ),
        seed(
            PermissionGroup::AUTHOR,
            Permissions::AUTHOR_RESTORE,
            "恢复作者",
        ),
        seed(
            PermissionGroup::AUTHOR,
            Permissions::AUTHOR_FORCE_DELETE,
            "删除作者（硬删除）",
        ),
        seed(PermissionGroup::BOOK, Permissions::BOOK_SHOW, "查看图书"),
        seed(PermissionGroup::BOOK, Permissions::BOOK_LIST, "查看图书列表"),
        seed(PermissionGroup::BOOK, Permissions::BOOK_CREATE, "创建图书"),
        seed(PermissionGroup::BOOK, Permissions::BOOK_UPDATE, "编辑图书"),
        seed(PermissionGroup::BOOK, Permissions::BOOK_DELETE, "删除图书"),
        seed(
            PermissionGroup::BOOK,
            Permissions::BOOK_UPLOAD_IMG,
            "上传图书图片",
        ),
        seed(PermissionGroup::MEDIA, Permissions::MEDIA_DELETE, "删除文件"),
    ]
}

/// 各默认角色的授权表；superadmin 不需要条目（隐式全量授权）
pub fn permissions_for_roles() -> Vec<(&'static str, Vec<&'static str>)> {
    vec![(
        DefaultRole::USER,
        vec![
            Permissions::AUTHOR_SHOW,
            Permissions::AUTHOR_LIST,
            Permissions::BOOK_SHOW,
            Permissions::BOOK_LIST,
        ],
    )]
}
