u8_registry! {
    /// Handshake message type.
    pub enum HandshakeType {
        HelloRequest => 0,
        ClientHello => 1,
        ServerHello => 2,
        HelloVerifyRequest => 3,
        NewSessionTicket => 4,
        Certificate => 11,
        ServerKeyExchange => 12,
        CertificateRequest => 13,
        ServerHelloDone => 14,
        CertificateVerify => 15,
        ClientKeyExchange => 16,
        Finished => 20,
        CertificateStatus => 22,
        SupplementalData => 23,
    }
}

impl HandshakeType {
    /// Messages that arrive in epoch 1 or later of a DTLS 1.2 handshake.
    pub fn is_protected(&self) -> bool {
        matches!(self, HandshakeType::Finished)
    }
}
