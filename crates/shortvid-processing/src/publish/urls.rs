/// Object key of a published video.
pub fn video_key(author_id: i64, file_name: &str) -> String {
    format!("{}/{}", author_id, file_name)
}

/// File name of the cover derived from a video file name.
pub fn cover_file_name(file_name: &str) -> String {
    format!("{}-cover.jpeg", file_name)
}

/// Object key of a video's cover.
pub fn cover_key(author_id: i64, file_name: &str) -> String {
    video_key(author_id, &cover_file_name(file_name))
}

/// Public URL of an object: `https://{bucket}.{endpoint}/{key}`.
///
/// A scheme on the configured endpoint is dropped; public URLs are always https.
pub fn public_object_url(bucket: &str, endpoint: &str, key: &str) -> String {
    let host = endpoint
        .split_once("://")
        .map_or(endpoint, |(_, host)| host)
        .trim_end_matches('/');
    format!("https://{}.{}/{}", bucket, host, key.trim_start_matches('/'))
}
