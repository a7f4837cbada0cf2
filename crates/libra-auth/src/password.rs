use bcrypt::{hash, verify, DEFAULT_COST};
use libra_error::{LibraError, Result};

/// 密码服务 - 单向哈希与校验，盐值内嵌在输出中
pub struct PasswordService;

impl PasswordService {
    /// 生成密码哈希，每次调用生成新的盐
    pub fn hash_password(password: &str) -> Result<String> {
        hash(password, DEFAULT_COST).map_err(|e| LibraError::Internal {
            message: format!("Failed to hash password: {}", e),
            details: None,
        })
    }

    /// 验证密码
    pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
        verify(password, hash).map_err(|e| LibraError::Internal {
            message: format!("Failed to verify password: {}", e),
            details: None,
        })
    }
}
