/// Application name
pub const APP_NAME: &str = "Chatty";

/// File name of the local settings database
pub const DB_FILE_NAME: &str = "chatty.db";

/// Settings key holding the UI theme preference
pub const THEME_KEY: &str = "chat-theme";

/// Theme used when no preference has been stored yet
pub const DEFAULT_THEME: &str = "coffee";

/// Default REST API base URL (local development backend)
pub const DEFAULT_API_URL: &str = "http://localhost:5001/api";

/// Default push transport base URL
pub const DEFAULT_SOCKET_URL: &str = "http://localhost:5001";

/// Default per-request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Socket.IO endpoint path and Engine.IO protocol revision
pub const SOCKET_IO_PATH: &str = "/socket.io/";
pub const ENGINE_IO_VERSION: &str = "4";

/// Query parameter carrying the identity id on the push connection
pub const SOCKET_USER_QUERY: &str = "userId";

/// Inbound push event names
pub const EVENT_NEW_MESSAGE: &str = "newMessage";
pub const EVENT_ONLINE_USERS: &str = "getOnlineUsers";
pub const EVENT_DISCONNECT: &str = "disconnect";

/// Fallback messages used when a failed response carries no message body
pub const FALLBACK_CHECK_AUTH: &str = "Failed to check authentication";
pub const FALLBACK_SIGNUP: &str = "Signup failed";
pub const FALLBACK_LOGIN: &str = "Login failed";
pub const FALLBACK_LOGOUT: &str = "Logout failed";
pub const FALLBACK_UPDATE_PROFILE: &str = "Profile update failed";
pub const FALLBACK_ADD_CONTACT: &str = "Add Contact failed";
pub const FALLBACK_FETCH_USERS: &str = "Failed to fetch users";
pub const FALLBACK_FETCH_MESSAGES: &str = "Failed to fetch messages";
pub const FALLBACK_SEND_MESSAGE: &str = "Failed to send message";

/// Precondition failure for sending without a selected conversation
pub const NO_PEER_SELECTED: &str = "No user selected to send message to.";

/// Success notices
pub const NOTICE_SIGNED_UP: &str = "Account created successfully";
pub const NOTICE_LOGGED_IN: &str = "Logged in successfully";
pub const NOTICE_LOGGED_OUT: &str = "Logged out successfully";
pub const NOTICE_PROFILE_UPDATED: &str = "Profile updated successfully";
pub const NOTICE_CONTACT_ADDED: &str = "New Contact Added";
