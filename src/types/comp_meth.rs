u8_registry! {
    /// Record compression method. Only `Null` is ever negotiated.
    #[derive(Default)]
    pub enum CompressionMethod {
        #[default]
        Null => 0,
        Deflate => 1,
    }
}
