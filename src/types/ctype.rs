u8_registry! {
    /// Record content type.
    pub enum ContentType {
        ChangeCipherSpec => 20,
        Alert => 21,
        Handshake => 22,
        ApplicationData => 23,
    }
}
