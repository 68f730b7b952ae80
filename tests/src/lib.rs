#[cfg(test)]
mod e2e;
