//! Backend message translation
//!
//! The backend reports errors in Spanish. Messages shown to the user go
//! through [`translate`]: an exact (case-insensitive, trimmed) table match
//! wins, then the longest table entry contained in the message, otherwise
//! the message is returned unchanged.

/// Spanish backend message → English UI message
const MESSAGES: &[(&str, &str)] = &[
    ("credenciales inválidas", "Invalid credentials"),
    ("usuario no encontrado", "User not found"),
    ("el correo ya está registrado", "Email is already registered"),
    ("el email ya está registrado", "Email is already registered"),
    ("el correo electrónico no es válido", "Email is not valid"),
    ("la contraseña debe tener al menos 6 caracteres", "Password must be at least 6 characters"),
    ("token expirado", "Session expired"),
    ("token inválido", "Invalid token"),
    ("refresh token inválido", "Invalid refresh token"),
    ("sesión expirada", "Session expired"),
    ("no autorizado", "Unauthorized"),
    ("acceso denegado", "Access denied"),
    ("no tienes permisos", "You do not have permission"),
    ("rol inválido", "Invalid role"),
    ("publicación no encontrada", "Post not found"),
    ("post no encontrado", "Post not found"),
    ("el título es obligatorio", "Title is required"),
    ("el contenido es obligatorio", "Content is required"),
    ("comentario no encontrado", "Comment not found"),
    ("ya has dado like a esta publicación", "You already liked this post"),
    ("like no encontrado", "Like not found"),
    ("datos inválidos", "Invalid data"),
    ("demasiadas solicitudes", "Too many requests"),
    ("error interno del servidor", "Internal server error"),
];

/// Translate a backend message for display
pub fn translate(message: &str) -> String {
    let normalized = message.trim().to_lowercase();
    if normalized.is_empty() {
        return message.trim().to_string();
    }

    if let Some((_, english)) = MESSAGES.iter().find(|(spanish, _)| *spanish == normalized) {
        return (*english).to_string();
    }

    MESSAGES
        .iter()
        .filter(|(spanish, _)| normalized.contains(spanish))
        .max_by_key(|(spanish, _)| spanish.len())
        .map_or_else(|| message.trim().to_string(), |(_, english)| (*english).to_string())
}
